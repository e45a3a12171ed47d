//! SO2R prefix swapping
//!
//! A port in SO2R mode talks to the second radio with the first radio's
//! commands and vice versa. The table is a set of pairs, so applying the
//! remap twice restores the original prefix.

const PAIRS: &[(&str, &str)] = &[
    ("FA", "FB"),
    ("IF", "IX"),
    ("ZZFA", "ZZFB"),
    ("ZZIF", "ZZIX"),
    ("ZZMD", "ZZME"),
    ("ZZAG", "ZZLE"),
    ("ZZRF", "ZZRW"),
    ("ZZRT", "ZZRY"),
    ("ZZFI", "ZZFJ"),
];

/// Swap a prefix with its partner, or return it unchanged if unpaired
pub fn remap(prefix: &str) -> &str {
    for &(a, b) in PAIRS {
        if prefix == a {
            return b;
        }
        if prefix == b {
            return a;
        }
    }
    prefix
}

/// True if the prefix takes part in SO2R swapping
pub fn is_paired(prefix: &str) -> bool {
    remap(prefix) != prefix
}

/// Rewrite a command whose body starts with `prefix`
pub fn remap_command(command: &str, prefix: &str) -> String {
    let swapped = remap(prefix);
    match command.strip_prefix(prefix) {
        Some(rest) => format!("{swapped}{rest}"),
        None => command.to_string(),
    }
}

/// Restore the caller's prefix in a reply to a swapped command
///
/// Only a leading occurrence of the swapped prefix is rewritten; a reply
/// that does not start with it (such as `?;`) passes through unchanged.
pub fn restore_reply(reply: &str, original_prefix: &str) -> String {
    let swapped = remap(original_prefix);
    match reply.strip_prefix(swapped) {
        Some(rest) => format!("{original_prefix}{rest}"),
        None => reply.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remap_is_involution() {
        for &(a, b) in PAIRS {
            assert_eq!(remap(a), b);
            assert_eq!(remap(remap(a)), a);
            assert_eq!(remap(remap(b)), b);
        }
    }

    #[test]
    fn test_unpaired_passthrough() {
        assert_eq!(remap("MD"), "MD");
        assert!(!is_paired("ZZTX"));
        assert!(is_paired("FB"));
    }

    #[test]
    fn test_remap_command_and_reply() {
        assert_eq!(remap_command("FA00014250000;", "FA"), "FB00014250000;");
        assert_eq!(remap_command("ZZFI;", "ZZFI"), "ZZFJ;");
        assert_eq!(restore_reply("FB00007000000;", "FA"), "FA00007000000;");
        assert_eq!(restore_reply("?;", "FA"), "?;");
    }
}
