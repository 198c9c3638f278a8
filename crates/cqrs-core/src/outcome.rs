//! 输出映射与调用方可见的结果分类

use errors::{AppError, AppResult};
use serde::Serialize;
use thiserror::Error;

use crate::PostFailure;

/// 文件输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutput {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// 映射后的输出
#[derive(Debug)]
pub enum MappedOutput {
    Json(serde_json::Value),
    File(FileOutput),
    Empty,
}

/// 输出映射器
///
/// 把 Handler 的响应映射为调用方可见的表示；
/// 映射失败是独立于 Handler 失败的结果类别
pub trait OutputMapper<T>: Send + Sync {
    fn map(&self, response: T) -> AppResult<MappedOutput>;
}

/// JSON 映射器
pub struct JsonMapper;

impl<T: Serialize> OutputMapper<T> for JsonMapper {
    fn map(&self, response: T) -> AppResult<MappedOutput> {
        serde_json::to_value(&response)
            .map(MappedOutput::Json)
            .map_err(|e| AppError::internal(format!("Failed to serialize response: {e}")))
    }
}

/// 管道错误
///
/// 每次 `execute` 恰好返回成功或其中一个；优先级
/// Forbidden > RequestBuildFailed > PreProcessorFailed/HandlerFailed >
/// OutputMappingFailed，低优先级失败绝不伪装成高优先级。
/// NotFound 单列：记录不存在是调用方可见的结果，不是 Handler 故障。
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Forbidden by policy '{policy}': {reason}")]
    Forbidden { policy: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request build failed: {0}")]
    RequestBuildFailed(#[source] AppError),

    #[error("Pre-processor '{processor}' rejected the request: {source}")]
    PreProcessorFailed {
        processor: &'static str,
        source: AppError,
    },

    #[error("Handler failed: {0}")]
    HandlerFailed(#[source] AppError),

    #[error("Output mapping failed: {0}")]
    OutputMappingFailed(#[source] AppError),
}

impl PipelineError {
    /// 转换为 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Forbidden { .. } => 403,
            Self::NotFound(_) => 404,
            Self::RequestBuildFailed(source) => source.status_code(),
            Self::PreProcessorFailed { source, .. } => {
                if source.is_cancelled() {
                    499
                } else {
                    500
                }
            }
            Self::HandlerFailed(source) => source.status_code(),
            Self::OutputMappingFailed(_) => 500,
        }
    }

    /// 指标用结果标签
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::RequestBuildFailed(_) => "request_build_failed",
            Self::PreProcessorFailed { .. } => "pre_processor_failed",
            Self::HandlerFailed(_) => "handler_failed",
            Self::OutputMappingFailed(_) => "output_mapping_failed",
        }
    }
}

/// 编排执行结果
///
/// 输出加上后置处理器的非致命失败
#[derive(Debug)]
pub struct Executed {
    pub output: MappedOutput,
    pub audit_failures: Vec<PostFailure>,
}

impl Executed {
    /// 操作成功且审计链路完整
    pub fn is_clean(&self) -> bool {
        self.audit_failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_mapper() {
        #[derive(Serialize)]
        struct Payload {
            id: u32,
        }

        let output = JsonMapper.map(Payload { id: 7 }).unwrap();
        match output {
            MappedOutput::Json(value) => assert_eq!(value["id"], 7),
            other => panic!("expected JSON output, got {other:?}"),
        }
    }

    #[test]
    fn test_status_codes_follow_priority_classes() {
        let forbidden = PipelineError::Forbidden {
            policy: "ViewSpreadsheet".to_string(),
            reason: "denied".to_string(),
        };
        assert_eq!(forbidden.status_code(), 403);
        assert_eq!(PipelineError::NotFound("x".to_string()).status_code(), 404);
        assert_eq!(
            PipelineError::RequestBuildFailed(AppError::validation("bad id")).status_code(),
            400
        );
        assert_eq!(
            PipelineError::RequestBuildFailed(AppError::cancelled("stop")).status_code(),
            499
        );
        assert_eq!(
            PipelineError::HandlerFailed(AppError::conflict("version")).status_code(),
            409
        );
        assert_eq!(
            PipelineError::OutputMappingFailed(AppError::internal("x")).status_code(),
            500
        );
    }
}
