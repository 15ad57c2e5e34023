// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Porter suffix-stripping stemmer
//!
//! Implements the five steps of M. F. Porter's 1980 algorithm over lowercase
//! ASCII words. Anything else (digits, non-ASCII letters, mixed tokens) is
//! returned unchanged, as are words of one or two letters.

use super::Stemmer;

/// Classic Porter stemmer
#[derive(Debug, Clone, Copy, Default)]
pub struct PorterStemmer;

impl PorterStemmer {
    pub fn new() -> Self {
        Self
    }
}

impl Stemmer for PorterStemmer {
    fn stem(&self, token: &str) -> String {
        if token.len() <= 2 || !token.bytes().all(|b| b.is_ascii_lowercase()) {
            return token.to_string();
        }

        let mut word = Word {
            b: token.as_bytes().to_vec(),
            j: 0,
        };
        word.step1ab();
        if word.k() > 0 {
            word.step1c();
            word.step2();
            word.step3();
            word.step4();
            word.step5();
        }
        word.b.iter().map(|&c| c as char).collect()
    }
}

/// Word being stemmed. `b` always holds exactly the live letters, so the last
/// index `k` is `b.len() - 1`; `j` marks the end of the stem found by `ends`.
struct Word {
    b: Vec<u8>,
    j: isize,
}

impl Word {
    fn k(&self) -> isize {
        self.b.len() as isize - 1
    }

    fn last(&self) -> u8 {
        self.b[self.b.len() - 1]
    }

    fn penultimate(&self) -> u8 {
        self.b[self.b.len() - 2]
    }

    /// Is `b[i]` a consonant? `y` counts as one at the start or after a vowel.
    fn cons(&self, i: isize) -> bool {
        match self.b[i as usize] {
            b'a' | b'e' | b'i' | b'o' | b'u' => false,
            b'y' => i == 0 || !self.cons(i - 1),
            _ => true,
        }
    }

    /// Number of vowel-consonant sequences in `b[0..=j]`, the `m` of `[C](VC)^m[V]`
    fn m(&self) -> usize {
        let mut n = 0;
        let mut i = 0isize;
        let j = self.j;
        loop {
            if i > j {
                return n;
            }
            if !self.cons(i) {
                break;
            }
            i += 1;
        }
        i += 1;
        loop {
            loop {
                if i > j {
                    return n;
                }
                if self.cons(i) {
                    break;
                }
                i += 1;
            }
            i += 1;
            n += 1;
            loop {
                if i > j {
                    return n;
                }
                if !self.cons(i) {
                    break;
                }
                i += 1;
            }
            i += 1;
        }
    }

    fn vowel_in_stem(&self) -> bool {
        (0..=self.j).any(|i| !self.cons(i))
    }

    /// `b[i-1..=i]` is a double consonant
    fn double_cons(&self, i: isize) -> bool {
        i >= 1 && self.b[i as usize] == self.b[(i - 1) as usize] && self.cons(i)
    }

    /// `b[i-2..=i]` is consonant-vowel-consonant and the last is not w, x or y
    fn cvc(&self, i: isize) -> bool {
        if i < 2 || !self.cons(i) || self.cons(i - 1) || !self.cons(i - 2) {
            return false;
        }
        !matches!(self.b[i as usize], b'w' | b'x' | b'y')
    }

    fn ends(&mut self, suffix: &str) -> bool {
        if !self.b.ends_with(suffix.as_bytes()) {
            return false;
        }
        self.j = self.k() - suffix.len() as isize;
        true
    }

    /// Replace everything after `j` with `s`
    fn set_to(&mut self, s: &str) {
        self.b.truncate((self.j + 1) as usize);
        self.b.extend_from_slice(s.as_bytes());
    }

    fn replace_if_measured(&mut self, s: &str) {
        if self.m() > 0 {
            self.set_to(s);
        }
    }

    fn replace_first(&mut self, rules: &[(&str, &str)]) {
        for (suffix, replacement) in rules {
            if self.ends(suffix) {
                self.replace_if_measured(replacement);
                return;
            }
        }
    }

    /// Plurals and -ed/-ing
    fn step1ab(&mut self) {
        if self.last() == b's' {
            if self.ends("sses") {
                self.b.truncate(self.b.len() - 2);
            } else if self.ends("ies") {
                self.set_to("i");
            } else if self.penultimate() != b's' {
                self.b.pop();
            }
        }
        if self.ends("eed") {
            if self.m() > 0 {
                self.b.pop();
            }
        } else if (self.ends("ed") || self.ends("ing")) && self.vowel_in_stem() {
            self.b.truncate((self.j + 1) as usize);
            if self.ends("at") {
                self.set_to("ate");
            } else if self.ends("bl") {
                self.set_to("ble");
            } else if self.ends("iz") {
                self.set_to("ize");
            } else if self.double_cons(self.k()) {
                if !matches!(self.last(), b'l' | b's' | b'z') {
                    self.b.pop();
                }
            } else if self.m() == 1 && self.cvc(self.k()) {
                self.set_to("e");
            }
        }
    }

    /// Terminal y to i when the stem has a vowel
    fn step1c(&mut self) {
        if self.ends("y") && self.vowel_in_stem() {
            let k = self.b.len() - 1;
            self.b[k] = b'i';
        }
    }

    /// Double suffixes to single ones
    fn step2(&mut self) {
        let rules: &[(&str, &str)] = match self.penultimate() {
            b'a' => &[("ational", "ate"), ("tional", "tion")],
            b'c' => &[("enci", "ence"), ("anci", "ance")],
            b'e' => &[("izer", "ize")],
            b'l' => &[
                ("bli", "ble"),
                ("alli", "al"),
                ("entli", "ent"),
                ("eli", "e"),
                ("ousli", "ous"),
            ],
            b'o' => &[("ization", "ize"), ("ation", "ate"), ("ator", "ate")],
            b's' => &[
                ("alism", "al"),
                ("iveness", "ive"),
                ("fulness", "ful"),
                ("ousness", "ous"),
            ],
            b't' => &[("aliti", "al"), ("iviti", "ive"), ("biliti", "ble")],
            b'g' => &[("logi", "log")],
            _ => &[],
        };
        self.replace_first(rules);
    }

    /// -ic-, -full, -ness and friends
    fn step3(&mut self) {
        let rules: &[(&str, &str)] = match self.last() {
            b'e' => &[("icate", "ic"), ("ative", ""), ("alize", "al")],
            b'i' => &[("iciti", "ic")],
            b'l' => &[("ical", "ic"), ("ful", "")],
            b's' => &[("ness", "")],
            _ => &[],
        };
        self.replace_first(rules);
    }

    /// Strip -ant, -ence etc. when the stem measure exceeds one
    fn step4(&mut self) {
        let matched = match self.penultimate() {
            b'a' => self.ends("al"),
            b'c' => self.ends("ance") || self.ends("ence"),
            b'e' => self.ends("er"),
            b'i' => self.ends("ic"),
            b'l' => self.ends("able") || self.ends("ible"),
            b'n' => self.ends("ant") || self.ends("ement") || self.ends("ment") || self.ends("ent"),
            b'o' => {
                (self.ends("ion") && self.j >= 0 && matches!(self.b[self.j as usize], b's' | b't'))
                    || self.ends("ou")
            }
            b's' => self.ends("ism"),
            b't' => self.ends("ate") || self.ends("iti"),
            b'u' => self.ends("ous"),
            b'v' => self.ends("ive"),
            b'z' => self.ends("ize"),
            _ => false,
        };
        if matched && self.m() > 1 {
            self.b.truncate((self.j + 1) as usize);
        }
    }

    /// Final -e and double -ll
    fn step5(&mut self) {
        self.j = self.k();
        if self.last() == b'e' {
            let a = self.m();
            if a > 1 || (a == 1 && !self.cvc(self.k() - 1)) {
                self.b.pop();
                // a dropped trailing vowel never changes the measure
                self.j = self.k();
            }
        }
        if self.last() == b'l' && self.double_cons(self.k()) && self.m() > 1 {
            self.b.pop();
        }
    }
}
