//! # ICTU Score Viewer
//!
//! 一个读取浏览器抓包、带签名访问 ICTU ionline 成绩接口的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `api/` - 签名引擎与带签名的 HTTP 客户端
//! - `query` - 上游通用 condition 过滤查询的编码器
//! - `capture` - 抓包文本解析与身份恢复
//! - `cache` - 依赖门控的查询缓存（合流、过期重验证、级联失效）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能查什么"，一个端点一个方法
//! - `ClassService` - 班级列表 / 班级详情 / 课程计划
//! - `TestService` - 周测验成绩 / 测验题目详情
//!
//! ### ③ 流程层（Workflow）
//! - `session` - 会话建立（抓包 → 身份）与五个依赖查询的键组合
//!
//! ### ④ 编排层（Orchestration）
//! - `app` - 批量成绩报表：班级 → 学期分组 → 周成绩 → 测验详情
//!
//! ## 模块结构

pub mod api;
pub mod app;
pub mod cache;
pub mod capture;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod query;
pub mod services;
pub mod session;

// 重新导出常用类型
pub use api::{ApiClient, RequestOptions, SignatureEngine};
pub use cache::{Dep, QueryCache, QuerySnapshot, QueryStatus};
pub use capture::{parse_captured_request, resolve_session, HeaderSet, SessionContext};
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use query::{Compare, FilterCondition, Joiner, ListQuery, SortOrder};
pub use session::SessionQueries;
