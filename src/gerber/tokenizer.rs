//! Gerber tokenizer (spec §4.3).
//!
//! Walks the raw input maintaining position and an "extended" (`%...%`)
//! flag, splitting it into `(line_number, command_text)` pairs. This
//! differs from the teacher's approach (`nom_locate::LocatedSpan` parsed
//! directly by a single top-level nom combinator over the whole file) —
//! Gerber's vendor dialects need the `%` toggle to special-case `G04`
//! comment bodies (a `%` inside a comment must not flip extended state),
//! which is naturally a character-walk rather than a combinator grammar.
//! The parser (`gerber::parser`) then re-parses each token's text.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub line: u32,
    pub text: String,
    pub extended: bool,
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut line: u32 = 1;
    let mut extended = false;
    let mut current = String::new();
    let mut current_line = line;

    // True once the word command being buffered is a G04 comment — a
    // literal '%' inside its text must not toggle extended state.
    let in_g04_comment = |buf: &str| !extended && buf.trim_start().starts_with("G04");

    for c in input.chars() {
        match c {
            '\n' | '\r' => {
                if c == '\n' {
                    line += 1;
                }
                if !extended {
                    if !current.trim().is_empty() {
                        tokens.push(Token {
                            line: current_line,
                            text: std::mem::take(&mut current),
                            extended: false,
                        });
                    } else {
                        current.clear();
                    }
                    current_line = line;
                } else {
                    current.push(c);
                }
            }
            '%' if in_g04_comment(&current) => {
                current.push('%');
            }
            '%' => {
                if !extended {
                    // Entering an extended command: anything buffered so
                    // far should only be whitespace.
                    current.clear();
                    current_line = line;
                    extended = true;
                } else {
                    tokens.push(Token {
                        line: current_line,
                        text: std::mem::take(&mut current),
                        extended: true,
                    });
                    extended = false;
                }
            }
            '*' if !extended => {
                tokens.push(Token {
                    line: current_line,
                    text: std::mem::take(&mut current),
                    extended: false,
                });
                current_line = line;
            }
            _ => {
                if current.is_empty() {
                    current_line = line;
                }
                current.push(c);
            }
        }
    }

    if !current.trim().is_empty() {
        tokens.push(Token {
            line: current_line,
            text: current,
            extended,
        });
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_scenario_s1() {
        let input = "%FSLAX23Y23*%\n%MOMM*%\n%ADD10C,0.500*%\nD10*\nX1000Y2000D03*\nM02*";
        let tokens = tokenize(input);
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["FSLAX23Y23", "MOMM", "ADD10C,0.500", "D10", "X1000Y2000D03", "M02"]);
    }

    #[test]
    fn extended_command_may_span_newlines() {
        let input = "%AMDONUT*\n1,1,0.5,0,0*\n%\n";
        let tokens = tokenize(input);
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].extended);
        assert!(tokens[0].text.contains('\n'));
    }

    #[test]
    fn percent_inside_g04_comment_does_not_toggle_extended() {
        let input = "G04 100% done*\nD10*\n";
        let tokens = tokenize(input);
        assert_eq!(tokens[0].text.trim(), "G04 100% done");
        assert_eq!(tokens[1].text.trim(), "D10");
    }
}
