//! Unit tests for pivotdb-core

use pivotdb_core::{
    config::MAX_BUCKET_PIVOTS,
    serialization::{decode_tuple_record, encode_tuple_record},
    DistanceBounds, Error, IndexConfig, Interval, SortKey, StrategyConfig,
};

mod config_tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        IndexConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_pivots_rejected() {
        let config = IndexConfig {
            pivot_count: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_degenerate_bounds_rejected() {
        for (min, max) in [(1.0, 1.0), (2.0, 1.0), (0.0, f64::INFINITY), (f64::NAN, 1.0)] {
            let config = IndexConfig {
                min_distance: min,
                max_distance: max,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "bounds [{}, {}] accepted", min, max);
        }
    }

    #[test]
    fn test_bucket_split_pivot_limit() {
        let config = IndexConfig {
            pivot_count: MAX_BUCKET_PIVOTS + 1,
            strategy: StrategyConfig::BucketSplit,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = IndexConfig {
            pivot_count: MAX_BUCKET_PIVOTS + 1,
            strategy: StrategyConfig::Pyramid,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_space_tree_depth_limit() {
        let config = IndexConfig {
            strategy: StrategyConfig::space_tree(17),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_partial_document() {
        let json = r#"{
            "pivot_count": 4,
            "max_distance": 16.0,
            "strategy": {
                "kind": "space_tree",
                "depth": 3,
                "cluster_retries": 5,
                "cluster_iterations": 10
            }
        }"#;
        let config = IndexConfig::from_json(json).unwrap();
        assert_eq!(config.pivot_count, 4);
        assert_eq!(config.max_distance, 16.0);
        assert_eq!(config.min_distance, 0.0);
        assert_eq!(
            config.strategy,
            StrategyConfig::SpaceTree {
                depth: 3,
                cluster_retries: 5,
                cluster_iterations: 10
            }
        );
        assert_eq!(config.cache.container_capacity, 1024);
    }

    #[test]
    fn test_from_json_unit_strategy() {
        let config =
            IndexConfig::from_json(r#"{ "strategy": { "kind": "bucket_split" } }"#).unwrap();
        assert_eq!(config.strategy, StrategyConfig::BucketSplit);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(IndexConfig::from_json("{ not json").is_err());
        assert!(IndexConfig::from_json(r#"{ "pivot_count": 0 }"#).is_err());
    }
}

mod types_tests {
    use super::*;

    #[test]
    fn test_sort_key_ordering() {
        let a = SortKey::new(1.25, 9);
        let b = SortKey::new(1.25, 10);
        let c = SortKey::new(2.0, 0);
        assert!(a < b);
        assert!(b < c);
        assert!(SortKey::lower_bound(1.25) <= a);
        assert!(SortKey::upper_bound(1.25) >= b);
        assert!(SortKey::upper_bound(1.25) < c);
    }

    #[test]
    fn test_bounds_normalize_clamps() {
        let bounds = DistanceBounds::new(2.0, 6.0);
        assert_eq!(bounds.normalize(2.0), 0.0);
        assert_eq!(bounds.normalize(4.0), 0.5);
        assert_eq!(bounds.normalize(6.0), 1.0);
        assert_eq!(bounds.normalize(10.0), 1.0);
        assert_eq!(bounds.normalize(-1.0), 0.0);
    }

    #[test]
    fn test_query_rect_clipping() {
        let bounds = DistanceBounds::new(0.0, 10.0);
        let rect = bounds.query_rect(&[1.0, 9.5], 2.0).unwrap();
        assert_eq!(rect, vec![Interval::new(0.0, 3.0), Interval::new(7.5, 10.0)]);

        // A query far outside the bounds cannot reach any indexed object
        assert!(bounds.query_rect(&[15.0], 2.0).is_none());
    }

    #[test]
    fn test_interval_overlap() {
        let a = Interval::new(0.0, 1.0);
        assert!(a.overlaps(&Interval::new(1.0, 2.0)));
        assert!(!a.overlaps(&Interval::new(1.1, 2.0)));
        assert!(Interval::new(2.0, 1.0).is_empty());
    }
}

mod serialization_tests {
    use super::*;

    #[test]
    fn test_tuple_record_roundtrip_preserves_bits() {
        let tuple = vec![0.1, 0.2 + 0.1, f64::MIN_POSITIVE, 1e300];
        let bytes = encode_tuple_record(u64::MAX, &tuple);
        let (id, decoded) = decode_tuple_record(&bytes).unwrap();
        assert_eq!(id, u64::MAX);
        for (a, b) in tuple.iter().zip(decoded.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_empty_tuple_record() {
        let bytes = encode_tuple_record(3, &[]);
        assert_eq!(bytes.len(), 12);
        assert_eq!(decode_tuple_record(&bytes).unwrap(), (3, vec![]));
    }
}

mod error_tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NotFrozen.error_code(), "NOT_FROZEN");
        assert_eq!(Error::AlreadyFrozen.error_code(), "ALREADY_FROZEN");
        assert_eq!(
            Error::ClusteringFailed { attempts: 3, points: 1 }.error_code(),
            "CLUSTERING_FAILED"
        );
        assert_eq!(Error::ObjectNotFound { id: 1 }.error_code(), "OBJECT_NOT_FOUND");
    }

    #[test]
    fn test_recoverability() {
        assert!(Error::FreezeInProgress.is_recoverable());
        assert!(Error::Storage { message: "busy".into() }.is_recoverable());
        assert!(!Error::AlreadyFrozen.is_recoverable());
        assert!(!Error::OutOfRange { pivot: 0, value: 2.0, min: 0.0, max: 1.0 }.is_recoverable());
        // Retrying cannot change the outcome for bad input or a missing id
        assert!(!Error::Codec { message: "truncated".into() }.is_recoverable());
        assert!(!Error::InvalidQuery { message: "negative radius".into() }.is_recoverable());
        assert!(!Error::ObjectNotFound { id: 7 }.is_recoverable());
    }

    #[test]
    fn test_display_mentions_bounds() {
        let err = Error::OutOfRange { pivot: 1, value: 12.5, min: 0.0, max: 10.0 };
        let text = err.to_string();
        assert!(text.contains("12.5"));
        assert!(text.contains("pivot 1"));
    }
}
