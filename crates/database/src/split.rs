#[derive(Clone, PartialEq)]
enum State {
    Normal,
    SingleQuote,
    DoubleQuote,
    LineComment,
    BlockComment,
    /// Inside `$tag$ ... $tag$`; the body starts at byte `body_start`.
    DollarQuote { delimiter: String, body_start: usize },
}

/// Tag of a dollar-quote opener whose leading `$` was just consumed, so
/// `$$` gives `""` and `$fn$` gives `"fn"`. Positional parameters like `$1`
/// are not openers.
fn dollar_tag(mut rest: impl Iterator<Item = char>) -> Option<String> {
    let mut tag = String::new();
    loop {
        match rest.next()? {
            '$' => return Some(tag),
            c if c == '_' || c.is_alphabetic() => tag.push(c),
            c if c.is_ascii_digit() && !tag.is_empty() => tag.push(c),
            _ => return None,
        }
    }
}

/// Split a SQL batch on `;`, ignoring semicolons inside string literals,
/// quoted identifiers, dollar-quoted bodies and comments. Statements that are
/// empty or only comments are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;
    let mut state = State::Normal;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match &state {
            State::Normal => match c {
                ';' => {
                    if has_code {
                        statements.push(current.trim().to_string());
                    }
                    current.clear();
                    has_code = false;
                    continue;
                }
                '\'' => {
                    state = State::SingleQuote;
                    has_code = true;
                }
                '"' => {
                    state = State::DoubleQuote;
                    has_code = true;
                }
                '$' => {
                    has_code = true;
                    let in_identifier = current
                        .chars()
                        .next_back()
                        .is_some_and(|prev| prev == '_' || prev.is_alphanumeric());
                    if let Some(tag) = dollar_tag(chars.clone()).filter(|_| !in_identifier) {
                        let delimiter = format!("${tag}$");
                        current.push_str(&delimiter);
                        for _ in 0..tag.chars().count() + 1 {
                            chars.next();
                        }
                        state = State::DollarQuote {
                            delimiter,
                            body_start: current.len(),
                        };
                        continue;
                    }
                }
                '-' if chars.peek() == Some(&'-') => {
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    current.push(c);
                    if let Some(star) = chars.next() {
                        current.push(star);
                    }
                    state = State::BlockComment;
                    continue;
                }
                c if !c.is_whitespace() => has_code = true,
                _ => {}
            },
            // A doubled quote inside a literal toggles out and straight back in.
            State::SingleQuote if c == '\'' => state = State::Normal,
            State::DoubleQuote if c == '"' => state = State::Normal,
            State::LineComment if c == '\n' => state = State::Normal,
            State::BlockComment if c == '*' && chars.peek() == Some(&'/') => {
                current.push(c);
                if let Some(slash) = chars.next() {
                    current.push(slash);
                }
                state = State::Normal;
                continue;
            }
            State::DollarQuote { delimiter, body_start } => {
                current.push(c);
                if current[*body_start..].ends_with(delimiter.as_str()) {
                    state = State::Normal;
                }
                continue;
            }
            _ => {}
        }
        current.push(c);
    }

    if has_code {
        statements.push(current.trim().to_string());
    }

    statements
}
