use log::LevelFilter;

use crate::error::{AirlockError, AirlockResult};

/// Command line options.
///
/// The only recognised flag is `--log-level=<value>`, which may be repeated;
/// the last occurrence wins. Anything else aborts before any hardware or
/// configuration is touched.
#[derive(Debug, PartialEq, Eq)]
pub struct Options {
  pub log_level: LevelFilter,
}

impl Options {
  pub fn parse<I>(args: I) -> AirlockResult<Options>
  where
    I: IntoIterator<Item = String>,
  {
    let mut log_level = LevelFilter::Info;

    for arg in args {
      if let Some(value) = arg.strip_prefix("--log-level=") {
        log_level = parse_log_level(value)?;
      }
      else {
        return Err(AirlockError::OptionInvalid(arg));
      }
    }

    Ok(Options { log_level })
  }
}

/// Accepts the named levels or an integer verbosity (0 = errors only,
/// larger numbers saturate at trace).
fn parse_log_level(value: &str) -> AirlockResult<LevelFilter> {
  match value {
    "error" => Ok(LevelFilter::Error),
    "warning" => Ok(LevelFilter::Warn),
    "info" => Ok(LevelFilter::Info),
    "debug" => Ok(LevelFilter::Debug),
    "trace" => Ok(LevelFilter::Trace),
    _ => match value.parse::<i64>() {
      Ok(verbosity) => Ok(match verbosity {
        i64::MIN..=0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
      }),
      Err(_) => Err(AirlockError::OptionInvalid(format!("--log-level={}", value))),
    },
  }
}
