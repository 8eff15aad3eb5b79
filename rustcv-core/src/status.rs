//! ABI 边界上的状态码
//!
//! 宿主只看到 Ok / Err；具体原因通过 tracing 记录。
//! 任何错误或 panic 都不能穿过这条边界。

use crate::error::Result;
use std::panic::{catch_unwind, AssertUnwindSafe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum DeviceStatus {
    Ok,
    Err,
}

impl DeviceStatus {
    pub fn is_ok(&self) -> bool {
        *self == Self::Ok
    }
}

impl<T> From<Result<T>> for DeviceStatus {
    fn from(res: Result<T>) -> Self {
        match res {
            Ok(_) => Self::Ok,
            Err(_) => Self::Err,
        }
    }
}

/// 运行一次操作，把 Result 和 panic 统一折叠为 DeviceStatus
pub fn guarded<F>(op: &'static str, f: F) -> DeviceStatus
where
    F: FnOnce() -> Result<()>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => DeviceStatus::Ok,
        Ok(Err(e)) => {
            tracing::error!(target: "rustcv::abi", "{op} failed: {e}");
            DeviceStatus::Err
        }
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "(unknown)".to_string());
            tracing::error!(target: "rustcv::abi", "{op} panicked: {msg}");
            DeviceStatus::Err
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CameraError;

    #[test]
    fn errors_become_status() {
        assert_eq!(guarded("noop", || Ok(())), DeviceStatus::Ok);
        assert_eq!(
            guarded("fail", || Err(CameraError::Cancelled)),
            DeviceStatus::Err
        );
    }

    #[test]
    fn panics_do_not_escape() {
        let status = guarded("boom", || panic!("register map corrupted"));
        assert_eq!(status, DeviceStatus::Err);
    }

    #[test]
    fn from_result() {
        let ok: Result<u32> = Ok(3);
        assert!(DeviceStatus::from(ok).is_ok());
    }
}
