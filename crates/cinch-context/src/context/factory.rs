//! Map a strategy key to a reducer instance.
//!
//! The factory is the composition root: it owns the shared config and
//! executor and hands each strategy what it needs. Every reducer it builds,
//! except Three-Zone (which sanitizes on its own), is wrapped in
//! [`OrphanSanitizing`] unless `sanitize_orphans` is switched off.

use super::ChatHistoryReducer;
use super::adaptive::AdaptiveReducer;
use super::counting::MessageCountingReducer;
use super::function_calls::FunctionCallPreservationReducer;
use super::keyword::KeywordAwareReducer;
use super::layered::LayeredReducer;
use super::sanitize::OrphanSanitizing;
use super::summarizing::SummarizingReducer;
use super::system_protection::SystemMessageProtection;
use super::three_zone::ThreeZoneReducer;
use crate::config::CompressionConfig;
use crate::error::ConfigError;
use crate::executor::CompletionExecutor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Every available reduction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReducerKind {
    MessageCounting,
    KeywordAware,
    /// System-message protection around message counting.
    SystemProtected,
    FunctionCallPreservation,
    Summarizing,
    Layered,
    Adaptive,
    ThreeZone,
}

impl ReducerKind {
    pub const ALL: [ReducerKind; 8] = [
        ReducerKind::MessageCounting,
        ReducerKind::KeywordAware,
        ReducerKind::SystemProtected,
        ReducerKind::FunctionCallPreservation,
        ReducerKind::Summarizing,
        ReducerKind::Layered,
        ReducerKind::Adaptive,
        ReducerKind::ThreeZone,
    ];

    /// The configuration key for this kind.
    pub fn key(self) -> &'static str {
        match self {
            ReducerKind::MessageCounting => "message-counting",
            ReducerKind::KeywordAware => "keyword-aware",
            ReducerKind::SystemProtected => "system-protected",
            ReducerKind::FunctionCallPreservation => "function-call-preservation",
            ReducerKind::Summarizing => "summarizing",
            ReducerKind::Layered => "layered",
            ReducerKind::Adaptive => "adaptive",
            ReducerKind::ThreeZone => "three-zone",
        }
    }

    /// Whether reductions of this kind may call the completion executor.
    pub fn uses_executor(self) -> bool {
        matches!(
            self,
            ReducerKind::Summarizing
                | ReducerKind::Layered
                | ReducerKind::Adaptive
                | ReducerKind::ThreeZone
        )
    }
}

impl fmt::Display for ReducerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ReducerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        ReducerKind::ALL
            .into_iter()
            .find(|k| k.key() == wanted)
            .ok_or_else(|| ConfigError::UnknownStrategy(s.to_string()))
    }
}

/// Builds reducers from a shared config and executor.
#[derive(Clone)]
pub struct ReducerFactory {
    config: Arc<CompressionConfig>,
    executor: Arc<dyn CompletionExecutor>,
}

impl ReducerFactory {
    pub fn new(config: Arc<CompressionConfig>, executor: Arc<dyn CompletionExecutor>) -> Self {
        Self { config, executor }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Build the strategy named by `config.strategy`.
    pub fn build_default(&self) -> Box<dyn ChatHistoryReducer> {
        self.build(self.config.strategy)
    }

    /// Build the strategy named by a configuration key.
    pub fn build_named(&self, key: &str) -> Result<Box<dyn ChatHistoryReducer>, ConfigError> {
        Ok(self.build(key.parse()?))
    }

    /// Build a strategy.
    pub fn build(&self, kind: ReducerKind) -> Box<dyn ChatHistoryReducer> {
        let threshold = self.config.message_count_threshold;
        let reducer: Box<dyn ChatHistoryReducer> = match kind {
            ReducerKind::MessageCounting => Box::new(MessageCountingReducer::new(threshold)),
            ReducerKind::KeywordAware => Box::new(KeywordAwareReducer::new(
                threshold,
                &self.config.critical_keywords,
            )),
            ReducerKind::SystemProtected => Box::new(SystemMessageProtection::new(
                MessageCountingReducer::new(threshold),
            )),
            ReducerKind::FunctionCallPreservation => {
                Box::new(FunctionCallPreservationReducer::new(threshold))
            }
            ReducerKind::Summarizing => Box::new(SummarizingReducer::new(
                self.config.clone(),
                self.executor.clone(),
            )),
            ReducerKind::Layered => Box::new(LayeredReducer::new(
                self.config.clone(),
                self.executor.clone(),
            )),
            ReducerKind::Adaptive => Box::new(AdaptiveReducer::new(
                self.config.clone(),
                self.executor.clone(),
            )),
            ReducerKind::ThreeZone => {
                return Box::new(ThreeZoneReducer::new(
                    self.config.clone(),
                    self.executor.clone(),
                ));
            }
        };

        debug!(
            "Built reducer '{kind}' (sanitize_orphans={})",
            self.config.sanitize_orphans
        );
        if self.config.sanitize_orphans {
            Box::new(OrphanSanitizing::new(reducer))
        } else {
            reducer
        }
    }
}

impl fmt::Debug for ReducerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReducerFactory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::ScriptedExecutor;

    fn factory(config: CompressionConfig) -> ReducerFactory {
        ReducerFactory::new(
            Arc::new(config),
            Arc::new(ScriptedExecutor::replying("summary")),
        )
    }

    #[test]
    fn every_kind_round_trips_through_its_key() {
        for kind in ReducerKind::ALL {
            assert_eq!(kind.key().parse::<ReducerKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.key());
        }
    }

    #[test]
    fn parse_is_lenient_about_case_and_underscores() {
        assert_eq!(
            "Three_Zone".parse::<ReducerKind>().unwrap(),
            ReducerKind::ThreeZone
        );
    }

    #[test]
    fn unknown_key_is_an_error() {
        let Err(err) = factory(CompressionConfig::default()).build_named("shrink-ray") else {
            panic!("expected an unknown strategy error");
        };
        assert!(matches!(err, ConfigError::UnknownStrategy(ref s) if s == "shrink-ray"));
    }

    #[test]
    fn builds_every_kind_with_matching_name() {
        let factory = factory(CompressionConfig::default());
        for kind in ReducerKind::ALL {
            assert_eq!(factory.build(kind).name(), kind.key());
        }
    }

    #[test]
    fn serde_uses_kebab_case_keys() {
        let json = serde_json::to_string(&ReducerKind::FunctionCallPreservation).unwrap();
        assert_eq!(json, "\"function-call-preservation\"");
    }

    #[test]
    fn default_follows_config() {
        let factory =
            factory(CompressionConfig::default().with_strategy(ReducerKind::Layered));
        assert_eq!(factory.build_default().name(), "layered");
    }

    #[test]
    fn executor_kinds() {
        assert!(ReducerKind::ThreeZone.uses_executor());
        assert!(!ReducerKind::KeywordAware.uses_executor());
    }
}
