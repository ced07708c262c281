//! Debian version string comparison per deb-version(5): an optional numeric
//! epoch before the first `:`, an upstream version, and an optional revision
//! after the last `-`. Within each part, alternating non-digit and digit
//! runs are compared; `~` sorts before everything including the empty
//! string, letters sort before non-letters, and digit runs compare by
//! numeric value.

use std::cmp::Ordering;

/// Compare two Debian version strings.
pub fn compare(a: &str, b: &str) -> Ordering {
    let (ae, au, ar) = split(a);
    let (be, bu, br) = split(b);

    ae.cmp(&be)
        .then_with(|| verrevcmp(au.as_bytes(), bu.as_bytes()))
        .then_with(|| verrevcmp(ar.as_bytes(), br.as_bytes()))
}

fn split(v: &str) -> (u64, &str, &str) {
    let (epoch, rest) = match v.split_once(':') {
        Some((e, rest)) => (e.parse::<u64>().unwrap_or(0), rest),
        None => (0, v),
    };
    let (upstream, revision) = match rest.rsplit_once('-') {
        Some((u, r)) => (u, r),
        None => (rest, ""),
    };
    (epoch, upstream, revision)
}

// Modified ASCII order: `~` before everything (even end of string, which is
// 0 here), letters before non-letters, digits handled by the caller.
fn order(c: u8) -> i32 {
    match c {
        b'~' => -1,
        c if c.is_ascii_digit() => 0,
        c if c.is_ascii_alphabetic() => c as i32,
        c => c as i32 + 256,
    }
}

fn verrevcmp(a: &[u8], b: &[u8]) -> Ordering {
    let (mut i, mut j) = (0, 0);

    while i < a.len() || j < b.len() {
        // Non-digit runs compare in modified ASCII order.
        while (i < a.len() && !a[i].is_ascii_digit()) || (j < b.len() && !b[j].is_ascii_digit()) {
            let ac = if i < a.len() { order(a[i]) } else { 0 };
            let bc = if j < b.len() { order(b[j]) } else { 0 };
            if ac != bc {
                return ac.cmp(&bc);
            }
            i += 1;
            j += 1;
        }

        // Digit runs compare by numeric value: skip leading zeroes, then the
        // first differing digit decides unless one run is longer.
        while i < a.len() && a[i] == b'0' {
            i += 1;
        }
        while j < b.len() && b[j] == b'0' {
            j += 1;
        }

        let mut first_diff = Ordering::Equal;
        while i < a.len() && a[i].is_ascii_digit() && j < b.len() && b[j].is_ascii_digit() {
            if first_diff == Ordering::Equal {
                first_diff = a[i].cmp(&b[j]);
            }
            i += 1;
            j += 1;
        }

        if i < a.len() && a[i].is_ascii_digit() {
            return Ordering::Greater;
        }
        if j < b.len() && b[j].is_ascii_digit() {
            return Ordering::Less;
        }
        if first_diff != Ordering::Equal {
            return first_diff;
        }
    }

    Ordering::Equal
}

#[cfg(test)]
mod test {
    use std::cmp::Ordering;

    use super::compare;

    #[test]
    fn test_epoch_wins() {
        assert_eq!(compare("1:1.0", "2.0"), Ordering::Greater);
        assert_eq!(compare("1:1.0", "2:0.1"), Ordering::Less);
    }

    #[test]
    fn test_tilde_sorts_first() {
        assert_eq!(compare("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(compare("1.0~~", "1.0~"), Ordering::Less);
        assert_eq!(compare("1.0~rc1", "1.0~rc1"), Ordering::Equal);
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        assert_eq!(compare("1.2", "1.10"), Ordering::Less);
        assert_eq!(compare("1.09", "1.9"), Ordering::Equal);
    }

    #[test]
    fn test_revision() {
        assert_eq!(compare("1.0-1", "1.0-2"), Ordering::Less);
        assert_eq!(compare("1.0", "1.0-1"), Ordering::Less);
        assert_eq!(compare("1.0-1", "1.0-1"), Ordering::Equal);
    }

    #[test]
    fn test_letters_before_non_letters() {
        assert_eq!(compare("1.0a", "1.0+"), Ordering::Less);
    }
}
