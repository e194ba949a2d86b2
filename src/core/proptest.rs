//! Property-based tests for the transcript buffer using proptest.
//!
//! These tests check the invariants the output view relies on:
//!
//! - The transcript never exceeds its character budget
//! - After a trim with a usable line boundary, the text starts at a line start
//! - Appended chunks keep their relative order

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::core::transcript::Transcript;

    // Short lines, some unterminated, with a few multi-byte characters
    fn chunk() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z]{0,12}\n",
            "[a-z]{1,30}",
            "[a-zé日]{0,8}\n[a-z]{0,8}",
            Just("\n".to_string()),
        ]
    }

    fn chunks() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(chunk(), 1..40)
    }

    proptest! {
        /// len(transcript) <= budget after every append.
        #[test]
        fn transcript_never_exceeds_budget(budget in 1usize..64, parts in chunks()) {
            let mut t = Transcript::new(budget);
            for part in &parts {
                t.append(part);
                prop_assert!(t.len() <= budget, "{} > {}", t.len(), budget);
                prop_assert_eq!(t.len(), t.as_str().chars().count());
            }
        }

        /// When a trim cuts old text that has a newline at or after the cutoff,
        /// the result starts at the beginning of a line.
        #[test]
        fn trim_lands_on_line_start(budget in 4usize..64, parts in chunks()) {
            let mut t = Transcript::new(budget);
            for part in &parts {
                let before = t.as_str().to_string();
                let old_len = before.chars().count();
                let part_len = part.chars().count();
                let trimmed = t.append(part);

                if trimmed && part_len <= budget {
                    let drop = old_len + part_len - budget;
                    let searched: String = before.chars().skip(drop.saturating_sub(1)).collect();
                    if searched.contains('\n') {
                        // Kept old text is a suffix of `before` starting after a newline
                        let kept_old = &t.as_str()[..t.as_str().len() - part.len()];
                        prop_assert!(before.ends_with(kept_old));
                        let cut = before.len() - kept_old.len();
                        prop_assert!(cut == 0 || before.as_bytes()[cut - 1] == b'\n');
                    }
                }
            }
        }

        /// Chunks that survive appear in the order they were appended.
        #[test]
        fn appended_chunks_keep_their_order(parts in prop::collection::vec("[a-z]{1,6}\n", 1..20)) {
            let total: usize = parts.iter().map(|p| p.len()).sum();
            let mut t = Transcript::new(total);
            for part in &parts {
                t.append(part);
            }
            prop_assert_eq!(t.as_str(), parts.concat());
        }

        /// A chunk larger than the whole budget keeps only its tail.
        #[test]
        fn oversized_chunk_keeps_a_suffix(budget in 1usize..32, text in "[a-z\n]{33,120}") {
            let mut t = Transcript::new(budget);
            t.append("previous\n");
            t.append(&text);
            prop_assert!(text.ends_with(t.as_str()));
            prop_assert!(!t.is_empty());
            prop_assert!(t.len() <= budget);
        }
    }
}
