use crate::config::{Config, RustEnv};
use log::{LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// HTTP stack underneath the provider clients; only shown at Trace level.
const HTTP_STACK_MODULES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2", "tracing"];

pub struct Logger {}

impl Logger {
    /// Installs the global terminal logger.
    ///
    /// Fails if a global logger is already installed.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        TermLogger::init(
            config.log_level_filter,
            Self::build_log_config(config.log_level_filter),
            TerminalMode::Mixed,
            Self::color_choice(config.runtime_env()),
        )
    }

    fn ignored_modules(level: LevelFilter) -> &'static [&'static str] {
        if level == LevelFilter::Trace {
            &[]
        } else {
            HTTP_STACK_MODULES
        }
    }

    /// Log collectors in deployed environments get plain text.
    fn color_choice(runtime_env: RustEnv) -> ColorChoice {
        match runtime_env {
            RustEnv::Development => ColorChoice::Auto,
            RustEnv::Staging | RustEnv::Production => ColorChoice::Never,
        }
    }

    fn build_log_config(level: LevelFilter) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder.set_time_format_rfc3339();
        builder.set_target_level(LevelFilter::Error);

        for module in Self::ignored_modules(level) {
            builder.add_filter_ignore_str(module);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_stack_hidden_below_trace() {
        for level in [LevelFilter::Warn, LevelFilter::Info, LevelFilter::Debug] {
            assert!(Logger::ignored_modules(level).contains(&"reqwest"));
        }
        assert!(Logger::ignored_modules(LevelFilter::Trace).is_empty());
        assert!(!HTTP_STACK_MODULES.contains(&"portcullis_auth"));
    }

    #[test]
    fn test_colors_only_in_development() {
        assert!(matches!(
            Logger::color_choice(RustEnv::Development),
            ColorChoice::Auto
        ));
        assert!(matches!(
            Logger::color_choice(RustEnv::Production),
            ColorChoice::Never
        ));
        assert!(matches!(
            Logger::color_choice(RustEnv::Staging),
            ColorChoice::Never
        ));
    }

    #[test]
    fn test_build_log_config_for_every_level() {
        for level in [LevelFilter::Off, LevelFilter::Info, LevelFilter::Trace] {
            let _config = Logger::build_log_config(level);
        }
    }
}
