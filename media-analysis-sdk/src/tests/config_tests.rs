//! Tests for configuration loading

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};

    use crate::config::{
        AnalysisServiceConfig, AutoSaveConfig, CompositeConfigProvider, ConfigProvider, ConfigProviderExt,
        GovernorConfig, MemoryConfigProvider, SequentialConfig, ServiceConfig,
    };
    use crate::core::GovernorBuilder;
    use crate::error::ErrorKind;

    fn provider(pairs: &[(&str, &str)]) -> MemoryConfigProvider {
        MemoryConfigProvider::with_values(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_governor_defaults() {
        let config = GovernorConfig::from_provider(&MemoryConfigProvider::new()).unwrap();

        assert_eq!(config.max_concurrent, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(35));
        assert_eq!(config.watchdog_interval, Duration::from_secs(15));
        assert_eq!(config.stuck_after(), Duration::from_secs(40));
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.cooldown, Duration::from_secs(60));
    }

    #[test]
    fn test_governor_overrides() {
        let config = GovernorConfig::from_provider(&provider(&[
            ("governor_max_concurrent", "2"),
            ("governor_request_timeout", "10s"),
            ("circuit_cooldown", "2m"),
            ("circuit_failure_threshold", "5"),
        ]))
        .unwrap();

        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.circuit_breaker.cooldown, Duration::from_secs(120));
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let error = GovernorConfig::from_provider(&provider(&[("governor_max_concurrent", "0")])).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_sequential_and_autosave_durations() {
        let source = provider(&[("sequential_inter_item_delay", "500ms"), ("autosave_debounce", "3")]);

        assert_eq!(SequentialConfig::from_provider(&source).inter_item_delay, Duration::from_millis(500));
        assert_eq!(AutoSaveConfig::from_provider(&source).debounce, Duration::from_secs(3));
        assert_eq!(
            SequentialConfig::from_provider(&MemoryConfigProvider::new()).inter_item_delay,
            Duration::from_millis(2000)
        );
    }

    #[test]
    fn test_service_config_validation() {
        let mut config = AnalysisServiceConfig {
            functions_url: "not a url".to_string(),
            api_key: "key".to_string(),
            ..AnalysisServiceConfig::default()
        };
        assert_err!(config.validate());

        config.functions_url = "https://demo.supabase.co/functions/v1".to_string();
        assert_ok!(config.validate());

        config.api_key.clear();
        assert_err!(config.validate());
    }

    #[test]
    fn test_composite_provider_falls_through() {
        let mut composite = CompositeConfigProvider::new();
        composite.add_provider(provider(&[("analysis_api_key", "override")]));
        composite.add_provider(provider(&[
            ("analysis_api_key", "base"),
            ("analysis_functions_url", "https://demo.supabase.co/functions/v1"),
        ]));

        assert_eq!(composite.get_string("analysis_api_key").unwrap(), "override");
        assert!(composite.get_string("missing").is_err());

        let config = AnalysisServiceConfig::from_provider(&composite).unwrap();
        assert_eq!(config.api_key, "override");
        assert_eq!(config.function_name, "analyze-media");
    }

    #[test]
    fn test_extension_parsers() {
        let source = provider(&[("count", " 7 "), ("bad", "soon")]);

        assert_eq!(source.get_int("count").unwrap(), 7);
        assert!(source.get_duration("bad").is_err());
        assert_eq!(source.get_duration_or("bad", Duration::from_secs(1)), Duration::from_secs(1));
        assert_eq!(source.get_int_or("missing", 3), 3);
    }

    #[test]
    fn test_builder_requires_backend() {
        let error = GovernorBuilder::from_provider(&MemoryConfigProvider::new())
            .unwrap()
            .build()
            .err()
            .unwrap();
        assert_eq!(error.kind(), ErrorKind::Configuration);
    }
}
