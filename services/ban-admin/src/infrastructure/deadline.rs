//! 操作超时
//!
//! 存储调用本身可能无限挂起，管理操作整体包一层截止时间。

use std::future::Future;
use std::time::Duration;

use warden_errors::{AppError, AppResult};

/// 在 `limit` 内完成 `operation`，否则返回 `AppError::Timeout`
pub async fn with_deadline<T, F>(limit: Duration, operation: &str, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        AppError::timeout(format!(
            "{} did not finish within {}s",
            operation,
            limit.as_secs_f64()
        ))
    })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let result = with_deadline(Duration::from_secs(1), "op", async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_hanging_operation_times_out() {
        let result: AppResult<()> = with_deadline(
            Duration::from_millis(20),
            "list-bans",
            std::future::pending(),
        )
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
        assert!(err.to_string().contains("list-bans"));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: AppResult<()> = with_deadline(Duration::from_secs(1), "op", async {
            Err(AppError::database("down"))
        })
        .await;
        assert!(matches!(result.unwrap_err(), AppError::Database(_)));
    }
}
