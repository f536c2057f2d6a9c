use thiserror::Error;

/// 访问层统一错误类型
///
/// ApiClient 是唯一的错误归一化出口：所有失败路径都收敛为下列
/// 五种判别值之一，以 Result 形式返回，绝不以 panic 越过边界。
/// 缓存条目需要原样保存并转交错误，因此这里全部用自有字段、
/// 可以 Clone，不持有第三方库的错误对象。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// 签名前置条件不满足：请求头中缺少 X-APP-ID
    #[error("缺少 X-APP-ID 凭证头，无法计算请求签名")]
    MissingCredential,

    /// 档案回退查询没有返回任何记录，学生身份无法确定
    #[error("无法解析学生身份：档案查询没有返回任何记录")]
    UnresolvedIdentity,

    /// 服务端返回非 2xx，且错误体可按 {code, message} 解析
    #[error("API 返回错误响应 (HTTP {status}): code={code}, message={message}")]
    Http {
        status: u16,
        code: String,
        message: String,
    },

    /// 响应体无法按预期结构解析（含 2xx 成功体变形的情况）
    #[error("响应解析失败: {message}")]
    Parse { message: String },

    /// 传输层失败，没有取得任何响应
    #[error("网络请求失败: {message}")]
    Transport { message: String },
}

impl ApiError {
    /// 创建解析错误
    pub fn parse(message: impl Into<String>) -> Self {
        ApiError::Parse {
            message: message.into(),
        }
    }

    /// 创建传输错误
    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport {
            message: message.into(),
        }
    }

    /// 是否为身份/凭证类错误，这类错误重试也不会恢复
    pub fn is_credential(&self) -> bool {
        matches!(
            self,
            ApiError::MissingCredential | ApiError::UnresolvedIdentity
        )
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Parse {
            message: err.to_string(),
        }
    }
}

/// 访问层结果类型别名
pub type ApiResult<T> = Result<T, ApiError>;
