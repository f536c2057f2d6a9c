//! 会话工作流 - 流程编排层
//!
//! 从抓包文本建立会话，然后把成绩钻取用到的五个查询挂到同
//! 一个缓存上。每个查询把自己的上游值编进缓存键：换班级、
//! 换周、换测验时，下游查询自动挂到新条目，旧条目原样保留。

use crate::api::{ApiClient, RequestOptions};
use crate::cache::{Dep, QueryCache, QuerySnapshot};
use crate::capture::{resolve_session, SessionContext};
use crate::error::ApiResult;
use crate::models::{
    ClassDetail, ClassStudent, CoursePlanActivity, ListEnvelope, TestDetail, TestResult,
    UserProfile,
};
use crate::services::{ClassService, TestService};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 一个会话的全部依赖查询
pub struct SessionQueries {
    cache: QueryCache,
    classes: ClassService,
    tests: TestService,
    ctx: SessionContext,
}

impl SessionQueries {
    /// 从抓包文本建立会话
    ///
    /// 抓包里没有学生 id 时走 user-profile 回退查询，一条记录
    /// 都没有则返回 UnresolvedIdentity。
    pub async fn establish(
        client: Arc<ApiClient>,
        capture_text: &str,
        fresh_window: Duration,
    ) -> ApiResult<Self> {
        let lookup_client = client.clone();
        let ctx = resolve_session(capture_text, move |headers| async move {
            let envelope: ListEnvelope<UserProfile> = lookup_client
                .execute("user-profile/", RequestOptions::get(&headers))
                .await?;
            Ok(envelope.data)
        })
        .await?;
        info!(
            "👤 会话就绪: student_id={:?} class_id={:?}",
            ctx.student_id, ctx.class_id
        );
        Ok(Self::with_context(client, ctx, fresh_window))
    }

    /// 用现成的上下文组装会话
    pub fn with_context(
        client: Arc<ApiClient>,
        ctx: SessionContext,
        fresh_window: Duration,
    ) -> Self {
        Self {
            cache: QueryCache::new(fresh_window),
            classes: ClassService::new(client.clone()),
            tests: TestService::new(client),
            ctx,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// 学生名下全部班级
    pub async fn classes(&self) -> QuerySnapshot<Vec<ClassStudent>> {
        let deps = [Dep::from(self.ctx.student_id)];
        let service = self.classes.clone();
        let headers = self.ctx.headers.clone();
        let student_id = self.ctx.student_id.unwrap_or_default();
        self.cache
            .subscribe("class-students", &deps, move || async move {
                service.all_classes(&headers, student_id).await
            })
            .await
    }

    /// 选中班级的详情
    pub async fn class_detail(&self, class_id: Option<i64>) -> QuerySnapshot<ClassDetail> {
        let deps = [Dep::from(class_id)];
        let service = self.classes.clone();
        let headers = self.ctx.headers.clone();
        let class_id = class_id.unwrap_or_default();
        self.cache
            .subscribe("class-detail", &deps, move || async move {
                service.class_detail(&headers, class_id).await
            })
            .await
    }

    /// 选中班级的课程计划
    pub async fn course_plan(
        &self,
        class_id: Option<i64>,
    ) -> QuerySnapshot<Vec<CoursePlanActivity>> {
        let deps = [Dep::from(class_id)];
        let service = self.classes.clone();
        let headers = self.ctx.headers.clone();
        let class_id = class_id.unwrap_or_default();
        self.cache
            .subscribe("class-plans", &deps, move || async move {
                service.course_plan(&headers, class_id).await
            })
            .await
    }

    /// 选中班级某一周的测验成绩
    pub async fn test_results(
        &self,
        class_id: Option<i64>,
        week: Option<i64>,
    ) -> QuerySnapshot<Vec<TestResult>> {
        let deps = [Dep::from(class_id), Dep::from(week)];
        let service = self.tests.clone();
        let headers = self.ctx.headers.clone();
        let class_id = class_id.unwrap_or_default();
        let week = week.unwrap_or_default();
        self.cache
            .subscribe("test-results", &deps, move || async move {
                service.test_results(&headers, class_id, week).await
            })
            .await
    }

    /// 选中测验的题目级详情
    pub async fn test_detail(&self, test_id: Option<i64>) -> QuerySnapshot<Option<TestDetail>> {
        let deps = [Dep::from(test_id)];
        let service = self.tests.clone();
        let headers = self.ctx.headers.clone();
        let test_id = test_id.unwrap_or_default();
        self.cache
            .subscribe("test-detail", &deps, move || async move {
                service.test_detail(&headers, test_id).await
            })
            .await
    }
}
