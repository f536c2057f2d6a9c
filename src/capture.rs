//! 抓包请求解析
//!
//! 会话的唯一外部输入是一段自由文本：第一个非空行是请求行
//! （`METHOD path?query`），其余非空行是 `Name: value` 请求头。
//! 请求行的查询串里可能嵌着原始调用的过滤条件，据此可以在
//! 不发请求的情况下直接恢复 student_id / class_id。

use crate::error::{ApiError, ApiResult};
use crate::models::UserProfile;
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, info};

/// 有序、大小写敏感的请求头集合，解析完成后不可变
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderSet {
    entries: Vec<(String, String)>,
}

impl HeaderSet {
    /// 从有序键值对构建（保持传入顺序）
    pub fn from_entries(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    /// 精确匹配查找（区分大小写）；同名头取最后一次出现的值
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按解析顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// 请求行可识别的 HTTP 方法，其他开头的行不做条件恢复
const KNOWN_METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "OPTIONS"];

/// 解析后的抓包请求
#[derive(Debug, Clone, Default)]
pub struct CapturedRequest {
    /// 请求行原文，输入为空时为空串
    pub request_line: String,
    pub headers: HeaderSet,
    /// 从查询串恢复的条件键值对（conditionKey → conditionValue）
    pub condition_params: HashMap<String, String>,
}

impl CapturedRequest {
    /// 按条件键读取并解析为数值 id
    pub fn condition_id(&self, key: &str) -> Option<i64> {
        self.condition_params
            .get(key)
            .and_then(|value| value.parse().ok())
    }
}

/// 会话上下文：一次解析产出，之后只读
///
/// class_id 允许为空，由后续的班级选择补位；student_id 在
/// resolve_session 成功后必定已就绪。
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub headers: HeaderSet,
    pub student_id: Option<i64>,
    pub class_id: Option<i64>,
}

/// 解析抓包文本
///
/// 请求头按第一个冒号切分、两侧去空白（值本身可以再含冒号），
/// 没有冒号的行直接跳过。解析本身不会失败，身份缺失由
/// resolve_session 的回退流程处理。
pub fn parse_captured_request(text: &str) -> CapturedRequest {
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());

    let request_line = match lines.next() {
        Some(line) => line.to_string(),
        None => return CapturedRequest::default(),
    };

    let mut entries = Vec::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            entries.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let condition_params = extract_condition_params(&request_line);

    CapturedRequest {
        request_line,
        headers: HeaderSet::from_entries(entries),
        condition_params,
    }
}

/// 从请求行的查询串恢复条件键值对
///
/// 查询串按 application/x-www-form-urlencoded 解码（与浏览器
/// URLSearchParams 一致），扫描 `condition[i][key]` 参数，配对
/// 同索引的 `condition[i][value]`。
pub fn extract_condition_params(request_line: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    if !KNOWN_METHODS
        .iter()
        .any(|method| request_line.starts_with(method))
    {
        return params;
    }

    let url = match request_line.split_whitespace().nth(1) {
        Some(url) => url,
        None => return params,
    };
    let query = match url.split_once('?') {
        Some((_, query)) => query,
        None => return params,
    };

    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let index_re = match Regex::new(r"^condition\[(\d+)\]\[key\]$") {
        Ok(re) => re,
        Err(_) => return params,
    };

    for (param_key, condition_key) in &pairs {
        let caps = match index_re.captures(param_key) {
            Some(caps) => caps,
            None => continue,
        };
        if condition_key.is_empty() {
            continue;
        }
        let value_param = format!("condition[{}][value]", &caps[1]);
        let condition_value = pairs
            .iter()
            .find(|(key, _)| key == &value_param)
            .map(|(_, value)| value.clone())
            .unwrap_or_default();
        params.insert(condition_key.clone(), condition_value);
    }

    params
}

/// 从抓包文本解析并补全会话上下文
///
/// student_id 优先取查询串中嵌入的条件；取不到时调用档案查询
/// 回退，取第一条记录的 id。回退没有记录时立即失败，这个错误
/// 不进缓存，因为它会卡住后续所有查询。
pub async fn resolve_session<F, Fut>(text: &str, profile_lookup: F) -> ApiResult<SessionContext>
where
    F: FnOnce(HeaderSet) -> Fut,
    Fut: Future<Output = ApiResult<Vec<UserProfile>>>,
{
    let captured = parse_captured_request(text);
    debug!(
        "解析到 {} 个请求头, {} 个嵌入条件",
        captured.headers.len(),
        captured.condition_params.len()
    );

    let class_id = captured.condition_id("class_id");
    let student_id = match captured.condition_id("student_id") {
        Some(id) => {
            info!("✓ 从抓包查询串恢复 student_id = {}", id);
            id
        }
        None => {
            info!("🔍 抓包中没有 student_id，回退到档案查询...");
            let profiles = profile_lookup(captured.headers.clone()).await?;
            let profile = profiles.first().ok_or(ApiError::UnresolvedIdentity)?;
            info!("✓ 档案查询解析到 student_id = {}", profile.id);
            profile.id
        }
    };

    Ok(SessionContext {
        headers: captured.headers,
        student_id: Some(student_id),
        class_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_params_recovered_from_request_line() {
        let line = "GET /class-students/?condition[0][key]=student_id&condition[0][value]=123&condition[0][compare]==";
        let params = extract_condition_params(line);
        assert_eq!(params.get("student_id").map(String::as_str), Some("123"));
    }

    #[test]
    fn test_condition_params_with_encoded_brackets() {
        // 浏览器复制出来的 URL 通常把方括号转义成 %5B / %5D
        let line = "GET /ionline/api/class-students/?limit=1000&condition%5B0%5D%5Bkey%5D=student_id&condition%5B0%5D%5Bvalue%5D=4567&condition%5B0%5D%5Bcompare%5D=%3D HTTP/1.1";
        let params = extract_condition_params(line);
        assert_eq!(params.get("student_id").map(String::as_str), Some("4567"));
    }

    #[test]
    fn test_request_line_without_known_method_yields_nothing() {
        let params = extract_condition_params(
            "FOO /class-students/?condition[0][key]=student_id&condition[0][value]=1",
        );
        assert!(params.is_empty());
    }

    #[test]
    fn test_headers_split_on_first_colon() {
        let text = "GET /user-profile/ HTTP/1.1\nX-APP-ID: abc\nAuthorization: Bearer xyz\nReferer: https://apps.ictu.edu.vn:9087/\n";
        let captured = parse_captured_request(text);

        assert_eq!(captured.headers.get("X-APP-ID"), Some("abc"));
        assert_eq!(captured.headers.get("Authorization"), Some("Bearer xyz"));
        // 值里的冒号要原样保留
        assert_eq!(
            captured.headers.get("Referer"),
            Some("https://apps.ictu.edu.vn:9087/")
        );
        // 大小写敏感
        assert_eq!(captured.headers.get("x-app-id"), None);
    }

    #[test]
    fn test_blank_lines_and_noise_are_skipped() {
        let text = "\n\nGET /a/ HTTP/1.1\n\nX-APP-ID: abc\nnot a header line\n\n";
        let captured = parse_captured_request(text);
        assert_eq!(captured.request_line, "GET /a/ HTTP/1.1");
        assert_eq!(captured.headers.len(), 1);
    }

    #[test]
    fn test_empty_input_parses_to_default() {
        let captured = parse_captured_request("   \n  \n");
        assert!(captured.request_line.is_empty());
        assert!(captured.headers.is_empty());
        assert!(captured.condition_params.is_empty());
    }

    #[test]
    fn test_embedded_student_id_skips_fallback() {
        let text = "GET /x/?condition[0][key]=student_id&condition[0][value]=99\nX-APP-ID: abc\n";
        // 回退一旦被触发就会失败，解析成功即证明没有走回退
        let ctx = tokio_test::block_on(resolve_session(text, |_headers| async {
            Err(ApiError::UnresolvedIdentity)
        }))
        .unwrap();

        assert_eq!(ctx.student_id, Some(99));
    }

    #[test]
    fn test_fallback_takes_first_profile_record() {
        let text = "GET /user-profile/ HTTP/1.1\nX-APP-ID: abc\n";
        let ctx = tokio_test::block_on(resolve_session(text, |headers| async move {
            assert_eq!(headers.get("X-APP-ID"), Some("abc"));
            Ok(vec![
                UserProfile {
                    id: 7,
                    ..Default::default()
                },
                UserProfile {
                    id: 8,
                    ..Default::default()
                },
            ])
        }))
        .unwrap();

        assert_eq!(ctx.student_id, Some(7));
        assert_eq!(ctx.class_id, None);
    }

    #[test]
    fn test_fallback_without_records_is_unresolved_identity() {
        let text = "GET /user-profile/ HTTP/1.1\nX-APP-ID: abc\n";
        let err = tokio_test::block_on(resolve_session(text, |_headers| async { Ok(Vec::new()) }))
            .unwrap_err();
        assert_eq!(err, ApiError::UnresolvedIdentity);
    }

    #[test]
    fn test_class_id_recovered_alongside_student_id() {
        let text = "GET /class-plans/?condition[0][key]=class_id&condition[0][value]=555&condition[1][key]=student_id&condition[1][value]=99\nX-APP-ID: abc\n";
        let ctx = tokio_test::block_on(resolve_session(text, |_headers| async { Ok(Vec::new()) }))
            .unwrap();
        assert_eq!(ctx.student_id, Some(99));
        assert_eq!(ctx.class_id, Some(555));
    }
}
