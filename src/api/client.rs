//! ionline HTTP 客户端
//!
//! 统一出口：转发抓包凭证头、注入签名、发送请求并把响应
//! 归类成类型化结果。调用方拿到的要么是反序列化好的数据，
//! 要么是 [`ApiError`]，客户端本身不会 panic。

use crate::api::signature::{is_mutating, SignatureEngine, SIGNATURE_HEADER};
use crate::capture::HeaderSet;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::models::ErrorEnvelope;
use crate::query::QueryParams;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// 单次请求的参数
pub struct RequestOptions<'a> {
    pub method: String,
    pub headers: &'a HeaderSet,
    pub body: Option<Value>,
    pub query: QueryParams,
}

impl<'a> RequestOptions<'a> {
    /// 构造任意方法的请求参数
    pub fn new(method: impl Into<String>, headers: &'a HeaderSet) -> Self {
        Self {
            method: method.into(),
            headers,
            body: None,
            query: Vec::new(),
        }
    }

    /// GET 请求
    pub fn get(headers: &'a HeaderSet) -> Self {
        Self::new("GET", headers)
    }

    /// 携带 JSON 请求体的 POST 请求
    pub fn post(headers: &'a HeaderSet, body: Value) -> Self {
        let mut options = Self::new("POST", headers);
        options.body = Some(body);
        options
    }

    /// 附加查询参数
    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }
}

/// ionline API 客户端
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    signer: SignatureEngine,
}

impl ApiClient {
    /// 创建使用系统时钟签名的客户端
    pub fn new(config: &Config) -> ApiResult<Self> {
        Self::with_signer(config, SignatureEngine::new())
    }

    /// 创建使用指定签名引擎的客户端
    pub fn with_signer(config: &Config, signer: SignatureEngine) -> ApiResult<Self> {
        // 核心不设总超时，沿用传输层默认
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ApiError::transport(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            http,
            base_url: normalize_base_url(&config.api_base_url),
            signer,
        })
    }

    /// 执行一次请求
    ///
    /// # 参数
    /// - `path`: 相对 base_url 的端点路径，不带前导斜杠
    /// - `options`: 方法、转发头、请求体与查询参数
    ///
    /// # 返回
    /// 2xx 且响应体可反序列化时返回 `T`，其余情况归类为
    /// Http / Parse / Transport 错误
    pub async fn execute<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions<'_>,
    ) -> ApiResult<T> {
        let request = self.prepare(path, &options)?;
        debug!("📤 {} {}", request.method(), request.url());

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| ApiError::transport(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::transport(e.to_string()))?;

        debug!("📥 {} <- {}", status, path);

        classify_response(status, &text)
    }

    /// 组装一次带签名的请求（不发送）
    ///
    /// 查询串只随 GET 拼接，变更类请求的参数走请求体；请求体
    /// 只序列化一次，参与签名的字节就是发出去的字节。
    fn prepare(&self, path: &str, options: &RequestOptions<'_>) -> ApiResult<reqwest::Request> {
        let url = format!("{}{}", self.base_url, path);
        let method = Method::from_bytes(options.method.as_bytes())
            .map_err(|_| ApiError::transport(format!("非法 HTTP 方法: {}", options.method)))?;

        let body_str = if is_mutating(&options.method) {
            match &options.body {
                Some(value) => serde_json::to_string(value)?,
                None => "{}".to_string(),
            }
        } else {
            String::new()
        };
        let signature = self.signer.sign_serialized(options.headers, &body_str)?;

        let mut header_map = to_header_map(options.headers);
        let signature_value = HeaderValue::from_str(&signature)
            .map_err(|e| ApiError::transport(format!("签名头不可用: {}", e)))?;
        header_map.insert(SIGNATURE_HEADER, signature_value);

        let is_get = method == Method::GET;
        let mut builder = self.http.request(method, &url).headers(header_map);
        if is_get && !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if is_mutating(&options.method) {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body_str);
        }
        builder
            .build()
            .map_err(|e| ApiError::transport(e.to_string()))
    }
}

/// 把响应归类成类型化结果
///
/// 2xx 走目标类型反序列化；非 2xx 先按错误信封解析，信封
/// 不成立（HTML 错误页、空响应体）再降级为解析错误。
fn classify_response<T: DeserializeOwned>(status: u16, body: &str) -> ApiResult<T> {
    if (200..300).contains(&status) {
        return serde_json::from_str::<T>(body)
            .map_err(|e| ApiError::parse(format!("响应体反序列化失败: {}", e)));
    }

    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => Err(ApiError::Http {
            status,
            code: envelope.code,
            message: envelope.message,
        }),
        Err(_) => Err(ApiError::parse(format!(
            "状态码 {} 且响应体不是错误信封: {}",
            status,
            snippet(body)
        ))),
    }
}

/// 把抓包头转换成 reqwest 头表
///
/// 个别头由 HTTP 栈自行生成，转发会和实际报文冲突，原样跳过；
/// 非法头名或头值同样跳过并告警，不让单个坏头拖垮整个请求。
fn to_header_map(headers: &HeaderSet) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers.iter() {
        if is_stack_managed(name) {
            continue;
        }
        let header_name = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(n) => n,
            Err(_) => {
                warn!("⚠️ 跳过非法头名: {}", name);
                continue;
            }
        };
        let header_value = match HeaderValue::from_str(value) {
            Ok(v) => v,
            Err(_) => {
                warn!("⚠️ 跳过非法头值: {}", name);
                continue;
            }
        };
        map.insert(header_name, header_value);
    }
    map
}

/// 由 HTTP 栈管理的头
fn is_stack_managed(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "host" | "content-length" | "connection"
    )
}

/// 保证 base_url 以单个斜杠结尾
fn normalize_base_url(raw: &str) -> String {
    format!("{}/", raw.trim_end_matches('/'))
}

/// 截取响应体片段用于错误信息
fn snippet(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(120)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    &body[..end]
}
