//! 请求签名引擎
//!
//! ionline 服务端要求每个请求携带 x-request-signature 头：对
//! `请求体串 + X-APP-ID + 按分钟截断的时间戳` 的 UTF-8 字节做
//! CRC-32 校验和，渲染成无符号大写十六进制（不补零）。
//! 服务端按自己的时钟校验、容差一分钟，时间戳必须固定用 UTC+7
//! 并把秒写死为 00；截断粒度和时区动一下，所有请求都会被拒。

use crate::capture::HeaderSet;
use crate::error::{ApiError, ApiResult};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde_json::Value;
use std::sync::Arc;

/// 凭证头名称（查找区分大小写，按抓包原样转发）
pub const APP_ID_HEADER: &str = "X-APP-ID";
/// 签名头名称
pub const SIGNATURE_HEADER: &str = "x-request-signature";

/// 服务端所在时区（越南，UTC+7）的秒偏移
const SERVER_UTC_OFFSET_SECS: i32 = 7 * 3600;

/// 可注入的时钟，保证同一分钟内签名可复现
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 系统时钟
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 请求签名引擎
pub struct SignatureEngine {
    clock: Arc<dyn Clock>,
    server_offset: FixedOffset,
}

impl SignatureEngine {
    /// 创建使用系统时钟的签名引擎
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// 创建使用指定时钟的签名引擎（测试中注入固定时钟）
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        // 25200 秒在 FixedOffset 的合法范围内，回退分支走不到
        let server_offset =
            FixedOffset::east_opt(SERVER_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix());
        Self {
            clock,
            server_offset,
        }
    }

    /// 计算请求签名
    ///
    /// # 参数
    /// - `method`: HTTP 方法，仅 POST/PUT 的请求体参与签名
    /// - `headers`: 转发的请求头，必须包含 X-APP-ID
    /// - `body`: 请求体，变更类请求缺失时按空对象 `{}` 签名
    ///
    /// # 返回
    /// 无符号大写十六进制的 CRC-32 校验和
    pub fn sign(
        &self,
        method: &str,
        headers: &HeaderSet,
        body: Option<&Value>,
    ) -> ApiResult<String> {
        let body_str = if is_mutating(method) {
            match body {
                Some(value) => serde_json::to_string(value)?,
                None => "{}".to_string(),
            }
        } else {
            String::new()
        };
        self.sign_serialized(headers, &body_str)
    }

    /// 对已序列化的请求体计算签名
    ///
    /// ApiClient 只序列化一次请求体，参与签名的字节和实际发送的
    /// 字节必须是同一份。
    pub fn sign_serialized(&self, headers: &HeaderSet, body_str: &str) -> ApiResult<String> {
        let app_id = headers
            .get(APP_ID_HEADER)
            .ok_or(ApiError::MissingCredential)?;
        let payload = format!("{}{}{}", body_str, app_id, self.minute_timestamp());
        Ok(format!("{:X}", crc32fast::hash(payload.as_bytes())))
    }

    /// 当前时间换算到 UTC+7 后按分钟截断的时间戳
    pub(crate) fn minute_timestamp(&self) -> String {
        self.clock
            .now()
            .with_timezone(&self.server_offset)
            .format("%Y-%m-%d %H:%M:00")
            .to_string()
    }
}

impl Default for SignatureEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// 仅 POST/PUT 携带请求体（与服务端约定一致，DELETE 不参与）
pub(crate) fn is_mutating(method: &str) -> bool {
    matches!(method.to_ascii_uppercase().as_str(), "POST" | "PUT")
}
