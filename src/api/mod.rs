//! API 模块
//!
//! 负责与 ionline 服务端的全部交互

pub mod client;
pub mod signature;

// 重新导出常用类型
pub use client::{ApiClient, RequestOptions};
pub use signature::{Clock, SignatureEngine, SystemClock, APP_ID_HEADER, SIGNATURE_HEADER};
