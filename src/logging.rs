//! Per-instance logger / 实例级日志
//!
//! Every `ObjectStorage` carries its own `Logger`, so a caller (or a test)
//! can route one instance's events to a dedicated subscriber without touching
//! the process-wide default.

use tracing::{Dispatch, Span};

/// Logger handle: optional dispatch plus the instance span / 日志句柄
#[derive(Clone)]
pub struct Logger {
    dispatch: Option<Dispatch>,
    span: Span,
}

impl Logger {
    /// Log through the process default subscriber / 使用全局订阅者
    pub fn current(host: &str) -> Self {
        Self {
            dispatch: None,
            span: tracing::info_span!("object_storage", host = %host),
        }
    }

    /// Log through the given dispatch only / 使用指定的订阅者
    pub fn with_dispatch(dispatch: Dispatch, host: &str) -> Self {
        let span = tracing::dispatcher::with_default(&dispatch, || {
            tracing::info_span!("object_storage", host = %host)
        });
        Self {
            dispatch: Some(dispatch),
            span,
        }
    }

    /// Silence this instance / 关闭日志
    pub fn disabled() -> Self {
        Self {
            dispatch: Some(Dispatch::none()),
            span: Span::none(),
        }
    }

    /// Run `f` with this logger's dispatch and span active / 在日志上下文中执行
    pub fn emit<F: FnOnce()>(&self, f: F) {
        match &self.dispatch {
            Some(dispatch) => {
                tracing::dispatcher::with_default(dispatch, || self.span.in_scope(f))
            }
            None => self.span.in_scope(f),
        }
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("injected", &self.dispatch.is_some())
            .finish()
    }
}

/// Log helpers bound to a `Logger` / 日志宏
macro_rules! log_info {
    ($logger:expr, $($arg:tt)+) => { $logger.emit(|| tracing::info!($($arg)+)) };
}
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)+) => { $logger.emit(|| tracing::warn!($($arg)+)) };
}
macro_rules! log_error {
    ($logger:expr, $($arg:tt)+) => { $logger.emit(|| tracing::error!($($arg)+)) };
}
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)+) => { $logger.emit(|| tracing::debug!($($arg)+)) };
}

pub(crate) use {log_debug, log_error, log_info, log_warn};

#[cfg(test)]
pub(crate) mod capture {
    //! In-memory log capture for tests / 测试用日志捕获

    use std::io::Write;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tracing::Dispatch;

    #[derive(Clone, Default)]
    pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }

        pub fn dispatch(&self) -> Dispatch {
            let sink = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_ansi(false)
                .with_max_level(tracing::Level::DEBUG)
                .with_writer(move || sink.clone())
                .finish();
            Dispatch::new(subscriber)
        }
    }

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
