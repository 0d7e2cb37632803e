//! Rule-based sentence splitting for pasted passages. Splits on
//! terminal punctuation while guarding common abbreviations so titles
//! like "Dr." do not end a sentence.

const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e",
];

/// Splits free text into trimmed sentences. Whitespace-only input
/// yields an empty vector.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = text.chars().collect();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        current.push(c);

        if is_terminator(c) && !ends_with_abbreviation(&current) {
            // Swallow trailing closers and repeated terminators (!?, ."),
            // then break when the next word starts a fresh sentence.
            let mut j = i + 1;
            while j < chars.len() && (is_terminator(chars[j]) || matches!(chars[j], '"' | '\'' | ')')) {
                current.push(chars[j]);
                j += 1;
            }
            if sentence_boundary(&chars[j..]) {
                push_sentence(&mut sentences, &mut current);
            }
            i = j;
            continue;
        }
        i += 1;
    }
    push_sentence(&mut sentences, &mut current);
    sentences
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// A boundary needs whitespace and then either end-of-text or an
/// uppercase/digit/quote opener.
fn sentence_boundary(rest: &[char]) -> bool {
    let mut iter = rest.iter();
    let Some(first) = iter.next() else {
        return true;
    };
    if !first.is_whitespace() {
        return false;
    }
    match iter.as_slice().iter().find(|c| !c.is_whitespace()) {
        None => true,
        Some(&c) => c.is_uppercase() || c.is_ascii_digit() || matches!(c, '"' | '\''),
    }
}

fn ends_with_abbreviation(current: &str) -> bool {
    let trimmed = current.trim_end_matches('.');
    let last_word: String = trimmed
        .chars()
        .rev()
        .take_while(|c| c.is_alphabetic() || *c == '.')
        .collect::<String>()
        .chars()
        .rev()
        .collect();
    let lowered = last_word.to_lowercase();
    ABBREVIATIONS.iter().any(|a| *a == lowered)
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_passage() {
        let out = split_sentences("The cat sat. It purred softly. Then it slept.");
        assert_eq!(
            out,
            vec!["The cat sat.", "It purred softly.", "Then it slept."]
        );
    }

    #[test]
    fn keeps_abbreviations_intact() {
        let out = split_sentences("Dr. Smith arrived early. Mrs. Jones was late.");
        assert_eq!(out, vec!["Dr. Smith arrived early.", "Mrs. Jones was late."]);
    }

    #[test]
    fn handles_question_and_exclamation_marks() {
        let out = split_sentences("Really? Yes! It is true.");
        assert_eq!(out, vec!["Really?", "Yes!", "It is true."]);
    }

    #[test]
    fn trailing_text_without_terminator_is_kept() {
        let out = split_sentences("First sentence. second half continues");
        assert_eq!(out, vec!["First sentence. second half continues"]);
    }

    #[test]
    fn empty_and_whitespace_input() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   \n\t ").is_empty());
    }

    #[test]
    fn keeps_closing_quote_with_sentence() {
        let out = split_sentences("\"Stop!\" she said. He stopped.");
        assert_eq!(out, vec!["\"Stop!\" she said.", "He stopped."]);
    }
}
