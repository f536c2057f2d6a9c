//! 班级查询服务 - 业务能力层
//!
//! 只负责班级相关的查询，不关心抓取顺序与缓存

use crate::api::{ApiClient, RequestOptions};
use crate::capture::HeaderSet;
use crate::error::ApiResult;
use crate::models::{ClassDetail, ClassStudent, CoursePlanActivity, DetailEnvelope, ListEnvelope};
use crate::query::{Compare, FilterCondition, ListQuery, QueryParams, SortOrder};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// 课程计划的 select 字段，与上游页面发出的请求一致
const PLAN_SELECT: &str =
    "id,class_id,course_id,course_plan_activity_id,week,title,date_start_of_week,date_end_of_week,teaching_day";

/// 班级查询服务
///
/// 职责：
/// - 学生名下全部班级
/// - 单个班级详情（含教师列表）
/// - 班级课程计划（按周）
#[derive(Clone)]
pub struct ClassService {
    client: Arc<ApiClient>,
}

impl ClassService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    /// 学生名下全部班级
    pub async fn all_classes(
        &self,
        headers: &HeaderSet,
        student_id: i64,
    ) -> ApiResult<Vec<ClassStudent>> {
        debug!("📚 拉取班级列表: student_id={}", student_id);
        let envelope: ListEnvelope<ClassStudent> = self
            .client
            .execute(
                "class-students/",
                RequestOptions::get(headers).with_query(classes_query(student_id)),
            )
            .await?;
        Ok(envelope.data)
    }

    /// 班级详情，带 managers 关联
    pub async fn class_detail(
        &self,
        headers: &HeaderSet,
        class_id: i64,
    ) -> ApiResult<ClassDetail> {
        debug!("🏫 拉取班级详情: class_id={}", class_id);
        let envelope: DetailEnvelope<ClassDetail> = self
            .client
            .execute(
                &format!("class/{}", class_id),
                RequestOptions::get(headers).with_query(detail_query()),
            )
            .await?;
        Ok(envelope.data)
    }

    /// 班级课程计划，按周升序
    pub async fn course_plan(
        &self,
        headers: &HeaderSet,
        class_id: i64,
    ) -> ApiResult<Vec<CoursePlanActivity>> {
        debug!("📋 拉取课程计划: class_id={}", class_id);
        let envelope: ListEnvelope<CoursePlanActivity> = self
            .client
            .execute(
                "class-plans/",
                RequestOptions::get(headers).with_query(plan_query(class_id)),
            )
            .await?;
        Ok(envelope.data)
    }
}

fn classes_query(student_id: i64) -> QueryParams {
    ListQuery::new()
        .limit(1000)
        .paged(1)
        .select("namhoc,hocky,class_id")
        .condition(FilterCondition::new("student_id", Compare::Eq, student_id))
        .build()
}

fn detail_query() -> QueryParams {
    ListQuery::new().with_relation("managers").build()
}

fn plan_query(class_id: i64) -> QueryParams {
    ListQuery::new()
        .limit(1000)
        .paged(1)
        .order_by("week", SortOrder::Asc)
        .select(PLAN_SELECT)
        .condition(FilterCondition::new("class_id", Compare::Eq, class_id))
        // 上游把 1000 用作占位周，恒排除
        .condition(FilterCondition::new("week", Compare::Ne, 1000))
        .build()
}

/// 一个学期内的班级
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermClasses {
    pub year: String,
    pub semester: i64,
    pub class_ids: Vec<i64>,
}

/// 按 (学年, 学期) 分组，升序输出
pub fn group_by_term(classes: &[ClassStudent]) -> Vec<TermClasses> {
    let mut grouped: BTreeMap<(String, i64), Vec<i64>> = BTreeMap::new();
    for class in classes {
        grouped
            .entry((class.namhoc.clone(), class.hocky))
            .or_default()
            .push(class.class_id);
    }
    grouped
        .into_iter()
        .map(|((year, semester), class_ids)| TermClasses {
            year,
            semester,
            class_ids,
        })
        .collect()
}

/// 课程计划覆盖的周，升序去重
pub fn plan_weeks(plan: &[CoursePlanActivity]) -> Vec<i64> {
    let mut weeks: Vec<i64> = plan.iter().map(|activity| activity.week).collect();
    weeks.sort_unstable();
    weeks.dedup();
    weeks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_of(year: &str, semester: i64, class_id: i64) -> ClassStudent {
        ClassStudent {
            namhoc: year.to_string(),
            hocky: semester,
            class_id,
        }
    }

    #[test]
    fn test_classes_query_composition() {
        let params = classes_query(123);

        assert!(params.contains(&("limit".to_string(), "1000".to_string())));
        assert!(params.contains(&("paged".to_string(), "1".to_string())));
        assert!(params.contains(&("select".to_string(), "namhoc,hocky,class_id".to_string())));
        assert!(params.contains(&("condition[0][key]".to_string(), "student_id".to_string())));
        assert!(params.contains(&("condition[0][value]".to_string(), "123".to_string())));
        assert!(params.contains(&("condition[0][compare]".to_string(), "=".to_string())));
        // 未指定连接词就不发 type
        assert!(!params.iter().any(|(k, _)| k == "condition[0][type]"));
    }

    #[test]
    fn test_plan_query_excludes_placeholder_week() {
        let params = plan_query(456);

        assert!(params.contains(&("orderby".to_string(), "week".to_string())));
        assert!(params.contains(&("order".to_string(), "ASC".to_string())));
        assert!(params.contains(&("condition[0][key]".to_string(), "class_id".to_string())));
        assert!(params.contains(&("condition[0][value]".to_string(), "456".to_string())));
        assert!(params.contains(&("condition[1][key]".to_string(), "week".to_string())));
        assert!(params.contains(&("condition[1][value]".to_string(), "1000".to_string())));
        assert!(params.contains(&("condition[1][compare]".to_string(), "<>".to_string())));
    }

    #[test]
    fn test_detail_query_only_requests_managers() {
        let params = detail_query();
        assert_eq!(params, vec![("with".to_string(), "managers".to_string())]);
    }

    #[test]
    fn test_group_by_term_sorts_and_groups() {
        let classes = vec![
            class_of("2023-2024", 2, 31),
            class_of("2022-2023", 1, 11),
            class_of("2023-2024", 1, 21),
            class_of("2023-2024", 2, 32),
        ];

        let groups = group_by_term(&classes);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].year, "2022-2023");
        assert_eq!(groups[0].semester, 1);
        assert_eq!(groups[0].class_ids, vec![11]);
        assert_eq!(groups[1].year, "2023-2024");
        assert_eq!(groups[1].semester, 1);
        assert_eq!(groups[2].semester, 2);
        assert_eq!(groups[2].class_ids, vec![31, 32]);
    }

    #[test]
    fn test_plan_weeks_dedup_and_sort() {
        let plan = vec![
            CoursePlanActivity {
                id: 1,
                class_id: 9,
                course_id: 2,
                course_plan_activity_id: 3,
                week: 5,
                title: None,
                date_start_of_week: None,
                date_end_of_week: None,
                teaching_day: None,
            },
            CoursePlanActivity {
                id: 2,
                class_id: 9,
                course_id: 2,
                course_plan_activity_id: 4,
                week: 2,
                title: Some("Tuần 2".to_string()),
                date_start_of_week: None,
                date_end_of_week: None,
                teaching_day: None,
            },
            CoursePlanActivity {
                id: 3,
                class_id: 9,
                course_id: 2,
                course_plan_activity_id: 5,
                week: 5,
                title: None,
                date_start_of_week: None,
                date_end_of_week: None,
                teaching_day: None,
            },
        ];

        assert_eq!(plan_weeks(&plan), vec![2, 5]);
        assert!(plan_weeks(&[]).is_empty());
    }
}
