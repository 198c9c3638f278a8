//! 报表输出映射

use cqrs_core::{FileOutput, MappedOutput, OutputMapper};
use errors::{AppError, AppResult};

use super::requests::ReportFile;

/// 导出文件映射器
///
/// 校验导出产物与该操作注册的媒体类型一致且流非空；
/// 不满足时作为“映射失败”上报，区别于 Handler 失败
pub struct ReportFileMapper {
    media_type: &'static str,
}

impl ReportFileMapper {
    pub fn new(media_type: &'static str) -> Self {
        Self { media_type }
    }
}

impl OutputMapper<ReportFile> for ReportFileMapper {
    fn map(&self, response: ReportFile) -> AppResult<MappedOutput> {
        if response.bytes.is_empty() {
            return Err(AppError::internal("Export produced an empty stream"));
        }
        if response.media_type != self.media_type {
            return Err(AppError::internal(format!(
                "Export produced media type '{}', expected '{}'",
                response.media_type, self.media_type
            )));
        }
        Ok(MappedOutput::File(FileOutput {
            file_name: response.file_name,
            media_type: response.media_type,
            bytes: response.bytes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(media_type: &str, bytes: Vec<u8>) -> ReportFile {
        ReportFile {
            file_name: "q3.csv".to_string(),
            media_type: media_type.to_string(),
            bytes,
        }
    }

    #[test]
    fn test_maps_named_stream() {
        let mapper = ReportFileMapper::new("text/csv");
        let output = mapper.map(file("text/csv", b"id\r\n".to_vec())).unwrap();
        match output {
            MappedOutput::File(file) => {
                assert_eq!(file.file_name, "q3.csv");
                assert_eq!(file.media_type, "text/csv");
            }
            other => panic!("expected file output, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_stream_is_a_mapping_error() {
        let mapper = ReportFileMapper::new("text/csv");
        let err = mapper.map(file("text/csv", Vec::new())).unwrap_err();
        assert_eq!(err, AppError::internal("Export produced an empty stream"));
    }

    #[test]
    fn test_media_type_mismatch_is_a_mapping_error() {
        let mapper = ReportFileMapper::new("text/csv");
        let err = mapper
            .map(file("application/pdf", b"%PDF".to_vec()))
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}
