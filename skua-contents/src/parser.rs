//! The Contents line state machine. A Contents index carries a free-form
//! preamble, then a header line whose first two tokens are `FILE` and
//! `LOCATION`, then data lines `<path><whitespace><location>`. Only the
//! segment after the last `/` of the location is reported.
//!
//! All scan state is owned, so a line interrupted at a scratch-buffer
//! boundary resumes exactly where it stopped, possibly on another worker.

use skua_matcher::Automaton;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    HeadOfLine,
    /// Accumulating the path token, case folding as configured.
    Key,
    /// Whitespace between path and location.
    Gap,
    /// Accumulating the location token.
    Value,
    /// Anything after the location is ignored.
    Trailing,
}

#[derive(Debug)]
pub(crate) struct ScanState {
    case_fold: bool,
    past_header: bool,
    state: LineState,
    key: Vec<u8>,
    value: Vec<u8>,
}

impl ScanState {
    pub(crate) fn new(case_fold: bool) -> Self {
        ScanState {
            case_fold,
            past_header: false,
            state: LineState::HeadOfLine,
            key: Vec::new(),
            value: Vec::new(),
        }
    }

    /// Run the state machine over one burst of inflated bytes.
    pub(crate) fn feed<V>(
        &mut self,
        chunk: &[u8],
        automaton: &Automaton<V>,
        emit: &mut impl FnMut(&str, &str),
    ) {
        use LineState::*;

        for &b in chunk {
            if b == b'\n' {
                self.end_line(automaton, emit);
                continue;
            }
            match self.state {
                HeadOfLine => {
                    if !b.is_ascii_whitespace() {
                        self.state = Key;
                        self.push_key(b);
                    }
                }
                Key => {
                    if b.is_ascii_whitespace() {
                        self.state = Gap;
                    } else {
                        self.push_key(b);
                    }
                }
                Gap => {
                    if !b.is_ascii_whitespace() {
                        self.state = Value;
                        self.value.push(b);
                    }
                }
                Value => {
                    if b.is_ascii_whitespace() {
                        self.state = Trailing;
                    } else {
                        self.value.push(b);
                    }
                }
                Trailing => {}
            }
        }
    }

    fn push_key(&mut self, b: u8) {
        self.key.push(if self.case_fold {
            b.to_ascii_lowercase()
        } else {
            b
        });
    }

    fn end_line<V>(&mut self, automaton: &Automaton<V>, emit: &mut impl FnMut(&str, &str)) {
        if !self.past_header {
            // Data lines only count once the FILE/LOCATION header passed.
            let header: &[u8] = if self.case_fold { b"file" } else { b"FILE" };
            if self.key == header && self.value == b"LOCATION" {
                self.past_header = true;
            }
        } else if !self.value.is_empty() && automaton.match_substring(&self.key).is_some() {
            let package = String::from_utf8_lossy(location_tail(&self.value));
            let path = String::from_utf8_lossy(&self.key);
            emit(&package, &path);
        }

        self.key.clear();
        self.value.clear();
        self.state = LineState::HeadOfLine;
    }
}

fn location_tail(value: &[u8]) -> &[u8] {
    match value.iter().rposition(|&b| b == b'/') {
        Some(i) => &value[i + 1..],
        None => value,
    }
}

#[cfg(test)]
mod test {
    use skua_matcher::Automaton;

    use super::ScanState;

    const INDEX: &[u8] = b"\
This file maps each file available in the archive to a package.

FILE LOCATION
usr/bin/fish shells/fish
usr/share/fish/config.fish shells/fish
etc/zsh/zshrc shells/zsh
";

    fn automaton(patterns: &[&str]) -> Automaton<()> {
        let mut a = Automaton::new();
        for p in patterns {
            a.augment(p.as_bytes(), ()).unwrap();
        }
        a
    }

    fn run(state: &mut ScanState, chunks: &[&[u8]], a: &Automaton<()>) -> Vec<(String, String)> {
        let mut hits = Vec::new();
        for chunk in chunks {
            state.feed(chunk, a, &mut |pkg: &str, path: &str| {
                hits.push((pkg.to_string(), path.to_string()))
            });
        }
        hits
    }

    #[test]
    fn test_header_gates_matching() {
        let a = automaton(&["fish", "archive"]);
        let mut state = ScanState::new(false);
        let hits = run(&mut state, &[INDEX], &a);

        // The preamble mentions "archive" but never counts as data.
        assert_eq!(
            hits,
            [
                ("fish".to_string(), "usr/bin/fish".to_string()),
                ("fish".to_string(), "usr/share/fish/config.fish".to_string()),
            ]
        );
    }

    #[test]
    fn test_resume_mid_line() {
        let a = automaton(&["fish", "archive"]);
        let mut whole = ScanState::new(false);
        let expected = run(&mut whole, &[INDEX], &a);

        // Feeding byte by byte exercises every possible suspension point.
        let mut split = ScanState::new(false);
        let chunks = INDEX.chunks(1).collect::<Vec<_>>();
        assert_eq!(run(&mut split, &chunks, &a), expected);
    }

    #[test]
    fn test_case_folding() {
        let index = b"FILE LOCATION\nUSR/BIN/FISH shells/fish\n";
        let a = automaton(&["fish"]);

        let mut folded = ScanState::new(true);
        let hits = run(&mut folded, &[index], &a);
        assert_eq!(hits, [("fish".to_string(), "usr/bin/fish".to_string())]);

        let mut exact = ScanState::new(false);
        assert!(run(&mut exact, &[index], &a).is_empty());
    }

    #[test]
    fn test_location_without_slash() {
        let index = b"FILE LOCATION\nusr/bin/fish fish\n";
        let a = automaton(&["fish"]);
        let mut state = ScanState::new(false);
        let hits = run(&mut state, &[index], &a);
        assert_eq!(hits, [("fish".to_string(), "usr/bin/fish".to_string())]);
    }

    #[test]
    fn test_line_without_location_ignored() {
        let index = b"FILE LOCATION\nusr/bin/fish\nusr/bin/zsh shells/zsh\n";
        let a = automaton(&["fish", "zsh"]);
        let mut state = ScanState::new(false);
        let hits = run(&mut state, &[index], &a);
        assert_eq!(hits, [("zsh".to_string(), "usr/bin/zsh".to_string())]);
    }
}
