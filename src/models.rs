//! ionline 接口的响应模型
//!
//! 列表接口返回 `{code, message, data: [...]}` 外加分页计数的信封，
//! 详情接口返回 `{code, message, data: {...}}`。字段名保持服务端
//! 原样（含越南语缩写），未建模的字段由 serde 忽略。

use serde::{Deserialize, Serialize};

/// 列表响应信封
#[derive(Debug, Clone, Deserialize)]
pub struct ListEnvelope<T> {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub draw: Option<i64>,
    #[serde(default)]
    pub next: Option<i64>,
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default, rename = "recordsTotal")]
    pub records_total: Option<i64>,
    #[serde(default, rename = "recordsFiltered")]
    pub records_filtered: Option<i64>,
}

/// 详情响应信封
#[derive(Debug, Clone, Deserialize)]
pub struct DetailEnvelope<T> {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    pub data: T,
}

/// 非 2xx 响应的错误信封，code 缺失视为信封不可解析
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// 学生档案（user-profile 回退查询）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub student_code: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// 选课记录，class-students 接口只裁剪出这三个字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassStudent {
    /// 学年，如 "2023-2024"
    pub namhoc: String,
    /// 学期序号
    pub hocky: i64,
    pub class_id: i64,
}

/// 班级负责教师（class 详情的 managers 关联）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassManager {
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

/// 班级详情
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDetail {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    /// 课程代号
    #[serde(default)]
    pub kyhieu: String,
    /// 学分数
    #[serde(default)]
    pub sotinchi: i64,
    #[serde(default)]
    pub namhoc: String,
    #[serde(default)]
    pub hocky: i64,
    #[serde(default)]
    pub managers: Vec<ClassManager>,
}

/// 课程计划周活动
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoursePlanActivity {
    pub id: i64,
    pub class_id: i64,
    #[serde(default)]
    pub course_id: i64,
    #[serde(default)]
    pub course_plan_activity_id: i64,
    pub week: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date_start_of_week: Option<String>,
    #[serde(default)]
    pub date_end_of_week: Option<String>,
    #[serde(default)]
    pub teaching_day: Option<String>,
}

/// 测验成绩记录（列表接口不裁剪，这里只建模钻取用到的字段）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: i64,
    #[serde(default)]
    pub class_plan_activity_id: i64,
    #[serde(default)]
    pub class_id: i64,
    #[serde(default)]
    pub week: i64,
    #[serde(default)]
    pub student_id: i64,
    /// 答题时长（分钟）
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub passing_point: f64,
    /// 0 未通过 / 1 通过
    #[serde(default)]
    pub passed: i64,
    #[serde(default)]
    pub questions: Vec<i64>,
    #[serde(default)]
    pub submit_at: Option<String>,
    #[serde(default)]
    pub status: i64,
    /// 总得分
    #[serde(default)]
    pub tong_diem: f64,
    #[serde(default)]
    pub hocky: Option<i64>,
}

impl TestResult {
    pub fn is_passed(&self) -> bool {
        self.passed != 0
    }
}

/// 测验里的单道题目（test 关联）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestQuestion {
    pub id: i64,
    #[serde(default)]
    pub question_number: i64,
    /// 题干
    #[serde(default)]
    pub question_direction: String,
    #[serde(default)]
    pub question_type: String,
    #[serde(default)]
    pub answer_option: Vec<AnswerOption>,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub number_answer_correct: i64,
}

/// 题目选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOption {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub value: String,
}

/// 测验的题目级详情
///
/// 上游把它放在列表信封里返回，取第一条即是目标测验。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDetail {
    pub id: i64,
    #[serde(default)]
    pub class_plan_activity_id: i64,
    #[serde(default)]
    pub av: i64,
    #[serde(default)]
    pub class_id: i64,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub questions: Vec<i64>,
    #[serde(default)]
    pub course_id: i64,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub test: Vec<TestQuestion>,
}
