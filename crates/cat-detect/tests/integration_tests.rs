//! Integration tests for port discovery
//!
//! These tests cover the provider seam from the outside:
//! - Port-number parsing of host port names
//! - Port name templates of the system provider
//! - A provider implementation built on the public traits

use cat_detect::{port_number, DetectError, PortProvider, SystemPortProvider};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;
    use cat_detect::{BoxedPortIo, ModemLines};
    use std::sync::Mutex;

    /// Lines that always read low
    pub struct IdleLines;

    impl ModemLines for IdleLines {
        fn clear_to_send(&mut self) -> Result<bool, DetectError> {
            Ok(false)
        }

        fn data_set_ready(&mut self) -> Result<bool, DetectError> {
            Ok(false)
        }
    }

    /// Provider keeping its pairs in memory
    #[derive(Default)]
    pub struct MemoryProvider {
        pub used: Mutex<Vec<u32>>,
    }

    impl PortProvider for MemoryProvider {
        fn used_numbers(&self) -> Result<Vec<u32>, DetectError> {
            Ok(self.used.lock().unwrap().clone())
        }

        fn create_pair(&self, low: u32, high: u32) -> Result<(), DetectError> {
            let mut used = self.used.lock().unwrap();
            if used.contains(&low) || used.contains(&high) {
                return Err(DetectError::PortBusy(format!("{}/{}", low, high)));
            }
            used.extend([low, high]);
            Ok(())
        }

        fn remove_pair(&self, low: u32, high: u32) -> Result<(), DetectError> {
            self.used.lock().unwrap().retain(|n| *n != low && *n != high);
            Ok(())
        }

        fn open(&self, _number: u32) -> Result<BoxedPortIo, DetectError> {
            let (gateway, _client) = tokio::io::duplex(64);
            Ok(Box::new(gateway))
        }

        fn open_lines(&self, _number: u32) -> Result<Box<dyn ModemLines>, DetectError> {
            Ok(Box::new(IdleLines))
        }

        fn port_name(&self, number: u32) -> String {
            format!("MEM{}", number)
        }
    }
}

// ============================================================================
// Port Name Tests
// ============================================================================

mod port_name_tests {
    use super::*;

    #[test]
    fn test_host_names_parse() {
        assert_eq!(port_number("COM4"), Some(4));
        assert_eq!(port_number("COM255"), Some(255));
        assert_eq!(port_number("/dev/ttyCAT14"), Some(14));
        assert_eq!(port_number("/dev/ttyS0"), Some(0));
        assert_eq!(port_number("/dev/cu.usbserial"), None);
    }

    #[test]
    fn test_template_round_trip() {
        let provider = SystemPortProvider::new("/dev/ttyCAT{n}", 9600);
        for n in [1, 4, 14, 255] {
            assert_eq!(port_number(&provider.port_name(n)), Some(n));
        }
    }
}

// ============================================================================
// Provider Trait Tests
// ============================================================================

mod provider_tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_provider_as_trait_object() {
        let provider: Arc<dyn PortProvider> = Arc::new(helpers::MemoryProvider::default());
        provider.create_pair(4, 14).unwrap();
        assert_eq!(provider.used_numbers().unwrap(), vec![4, 14]);

        assert!(matches!(
            provider.create_pair(4, 14),
            Err(DetectError::PortBusy(_))
        ));

        provider.remove_pair(4, 14).unwrap();
        assert!(provider.used_numbers().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_opened_lines_read() {
        let provider = helpers::MemoryProvider::default();
        let mut lines = provider.open_lines(14).unwrap();
        assert!(!lines.clear_to_send().unwrap());
        assert!(!lines.data_set_ready().unwrap());
        assert!(provider.open(14).is_ok());
    }

    #[test]
    fn test_errors_display() {
        let e = DetectError::Unsupported("no pair driver".into());
        assert!(e.to_string().contains("no pair driver"));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn name_prefix() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("COM"),
            Just("/dev/ttyCAT"),
            Just("/dev/ttyUSB"),
            Just("/dev/pts/"),
        ]
    }

    proptest! {
        #[test]
        fn port_number_reads_trailing_digits(prefix in name_prefix(), n in 0u32..100_000) {
            prop_assert_eq!(port_number(&format!("{prefix}{n}")), Some(n));
        }

        #[test]
        fn port_number_never_panics(name in "\\PC{0,32}") {
            let _ = port_number(&name);
        }

        #[test]
        fn template_substitutes_number(n in 1u32..=255) {
            let provider = SystemPortProvider::new("COM{n}", 9600);
            prop_assert_eq!(provider.port_name(n), format!("COM{n}"));
        }
    }
}
