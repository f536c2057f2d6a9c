//! 测验查询服务 - 业务能力层
//!
//! 只负责测验成绩与测验详情的查询，不关心抓取顺序与缓存

use crate::api::{ApiClient, RequestOptions};
use crate::capture::HeaderSet;
use crate::error::ApiResult;
use crate::models::{ListEnvelope, TestDetail, TestResult};
use crate::query::{Compare, FilterCondition, Joiner, ListQuery, QueryParams, SortOrder};
use std::sync::Arc;
use tracing::debug;

/// 测验详情的 select 字段，与上游页面发出的请求一致
const DETAIL_SELECT: &str = "id,class_plan_activity_id,av,class_id,time,questions,course_id,status";

/// 测验查询服务
///
/// 职责：
/// - 某班某周的测验成绩
/// - 单场测验的题目级详情
#[derive(Clone)]
pub struct TestService {
    client: Arc<ApiClient>,
}

impl TestService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// 某班某周的测验成绩
    pub async fn test_results(
        &self,
        headers: &HeaderSet,
        class_id: i64,
        week: i64,
    ) -> ApiResult<Vec<TestResult>> {
        debug!("📊 拉取测验成绩: class_id={} week={}", class_id, week);
        let envelope: ListEnvelope<TestResult> = self
            .client
            .execute(
                "class-plan-activity-student-tests/",
                RequestOptions::get(headers).with_query(results_query(class_id, week)),
            )
            .await?;
        Ok(envelope.data)
    }

    /// 单场测验的题目级详情
    ///
    /// 上游以列表信封返回，取第一条；查不到时返回 None。
    pub async fn test_detail(
        &self,
        headers: &HeaderSet,
        test_id: i64,
    ) -> ApiResult<Option<TestDetail>> {
        debug!("🔍 拉取测验详情: test_id={}", test_id);
        let envelope: ListEnvelope<TestDetail> = self
            .client
            .execute(
                "class-plan-activity-student-tests/",
                RequestOptions::get(headers).with_query(detail_query(test_id)),
            )
            .await?;
        Ok(envelope.data.into_iter().next())
    }
}

fn results_query(class_id: i64, week: i64) -> QueryParams {
    ListQuery::new()
        .limit(1000)
        .paged(1)
        .order_by("id", SortOrder::Asc)
        .condition(FilterCondition::new("week", Compare::EqStrict, week))
        // 上游抓包对第二个条件显式携带 and
        .condition(FilterCondition::new("class_id", Compare::EqStrict, class_id).joined(Joiner::And))
        .build()
}

fn detail_query(test_id: i64) -> QueryParams {
    ListQuery::new()
        .select(DETAIL_SELECT)
        .with_relation("test")
        .condition(FilterCondition::new("id", Compare::EqStrict, test_id))
        .build()
}

/// 成绩里出现过的周，升序去重
pub fn result_weeks(results: &[TestResult]) -> Vec<i64> {
    let mut weeks: Vec<i64> = results.iter().map(|r| r.week).collect();
    weeks.sort_unstable();
    weeks.dedup();
    weeks
}
