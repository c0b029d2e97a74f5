//! Configurable character-class tokenizer.
//!
//! The same engine is configured three different ways by the rest of the
//! interpreter: once for whole-script preprocessing (line-oriented, `@`
//! extraction, `#` comments), once for expression text (operator-character
//! extraction, escape substitutions), and once for argument lists (comma
//! extraction inside parentheses). Configuration is builder-style; `lex`
//! itself takes `&self` so one configured lexer can be reused.

// ── Token ─────────────────────────────────────────────────────────────────────

/// One lexed token.
///
/// `quoted` distinguishes a string literal from bare text: the quote
/// characters themselves are stripped, so `"if"` and `if` lex to the same
/// `text` but different `quoted` flags. Capsule tokens (e.g. `(a b c)`)
/// keep their delimiters and are never `quoted`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Token {
    pub text: String,
    pub quoted: bool,
    pub line: u32,
}

impl Token {
    pub fn new(text: impl Into<String>, line: u32) -> Self {
        Token { text: text.into(), quoted: false, line }
    }

    pub fn quoted(text: impl Into<String>, line: u32) -> Self {
        Token { text: text.into(), quoted: true, line }
    }

    /// The token as it would appear in source, quotes restored.
    pub fn to_source(&self) -> String {
        if self.quoted {
            format!("\"{}\"", self.text)
        } else {
            self.text.clone()
        }
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

type CharPred = fn(char) -> bool;

/// The tokenizer engine. All configuration methods consume and return
/// `self` so configs read as a single chained expression.
#[derive(Default, Clone)]
pub struct Lexer {
    quotes: Vec<char>,
    capsules: Vec<(char, char)>,
    ignores: Vec<char>,
    linebreaks: Vec<char>,
    extracts: Vec<char>,
    lineskips: Vec<char>,
    backslash_subs: Vec<(char, char)>,
    drop_empty: bool,
    keep_backslashes: bool,
    quote_if: Vec<CharPred>,
    ignore_if: Vec<CharPred>,
    linebreak_if: Vec<CharPred>,
    extract_if: Vec<CharPred>,
    lineskip_if: Vec<CharPred>,
}

impl Lexer {
    pub fn new() -> Self {
        Lexer::default()
    }

    /// String-literal delimiter. Opening and closing delimiter must match.
    pub fn quote(mut self, c: char) -> Self {
        if !self.quotes.contains(&c) {
            self.quotes.push(c);
        }
        self
    }

    /// Bracket pair kept together as a single token, delimiters included.
    /// Pairs may nest; mixed nesting (`(` closed by `]`) is an error.
    pub fn capsule(mut self, open: char, close: char) -> Self {
        let clash = self.capsules.iter().any(|&(o, c)| {
            o == open || o == close || c == open || c == close
        });
        if !clash {
            self.capsules.push((open, close));
        }
        self
    }

    /// Separator character: ends the current token and is discarded.
    pub fn ignore(mut self, c: char) -> Self {
        if !self.ignores.contains(&c) {
            self.ignores.push(c);
        }
        self
    }

    /// Separator that also advances the line counter.
    pub fn linebreak(mut self, c: char) -> Self {
        if !self.linebreaks.contains(&c) {
            self.linebreaks.push(c);
        }
        self
    }

    /// Character emitted as its own single-character token.
    pub fn extract(mut self, c: char) -> Self {
        if !self.extracts.contains(&c) {
            self.extracts.push(c);
        }
        self
    }

    /// Character that discards the rest of the line (comments).
    pub fn lineskip(mut self, c: char) -> Self {
        if !self.lineskips.contains(&c) {
            self.lineskips.push(c);
        }
        self
    }

    /// Substitution applied after a backslash: `\n` with `('n', '\n')`
    /// yields a newline. Unregistered characters pass through literally.
    pub fn backslash_sub(mut self, c: char, to: char) -> Self {
        self.backslash_subs.push((c, to));
        self
    }

    /// Keep backslashes as ordinary characters instead of treating them
    /// as escape introducers.
    pub fn keep_backslashes(mut self) -> Self {
        self.keep_backslashes = true;
        self
    }

    /// Suppress empty tokens between adjacent separators.
    pub fn drop_empty(mut self) -> Self {
        self.drop_empty = true;
        self
    }

    pub fn quote_if(mut self, pred: CharPred) -> Self {
        self.quote_if.push(pred);
        self
    }

    pub fn ignore_if(mut self, pred: CharPred) -> Self {
        self.ignore_if.push(pred);
        self
    }

    pub fn linebreak_if(mut self, pred: CharPred) -> Self {
        self.linebreak_if.push(pred);
        self
    }

    pub fn extract_if(mut self, pred: CharPred) -> Self {
        self.extract_if.push(pred);
        self
    }

    pub fn lineskip_if(mut self, pred: CharPred) -> Self {
        self.lineskip_if.push(pred);
        self
    }

    fn is_quote(&self, c: char) -> bool {
        self.quotes.contains(&c) || self.quote_if.iter().any(|p| p(c))
    }

    fn is_ignore(&self, c: char) -> bool {
        self.ignores.contains(&c) || self.ignore_if.iter().any(|p| p(c))
    }

    fn is_linebreak(&self, c: char) -> bool {
        self.linebreaks.contains(&c) || self.linebreak_if.iter().any(|p| p(c))
    }

    fn is_extract(&self, c: char) -> bool {
        self.extracts.contains(&c) || self.extract_if.iter().any(|p| p(c))
    }

    fn is_lineskip(&self, c: char) -> bool {
        self.lineskips.contains(&c) || self.lineskip_if.iter().any(|p| p(c))
    }

    fn is_capsule_open(&self, c: char) -> bool {
        self.capsules.iter().any(|&(o, _)| o == c)
    }

    fn is_capsule_close(&self, c: char) -> bool {
        self.capsules.iter().any(|&(_, cl)| cl == c)
    }

    fn closes(&self, open: char, close: char) -> bool {
        self.capsules.iter().any(|&(o, c)| o == open && c == close)
    }

    fn backslash_target(&self, c: char) -> char {
        self.backslash_subs
            .iter()
            .find(|&&(from, _)| from == c)
            .map(|&(_, to)| to)
            .unwrap_or(c)
    }

    /// Tokenize `src`. Lines are 1-based, counted by linebreak characters
    /// wherever they occur (including inside quotes and capsules).
    pub fn lex(&self, src: &str) -> Result<Vec<Token>, String> {
        let chars: Vec<char> = src.chars().collect();
        let mut out: Vec<Token> = Vec::new();
        let mut opens: Vec<char> = Vec::new();
        let mut in_quote: Option<char> = None;
        let mut skipping = false;
        let mut line: u32 = 1;
        let mut token = Token::default();

        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if self.is_linebreak(c) {
                line += 1;
            }
            if in_quote.is_none()
                && opens.is_empty()
                && (self.is_ignore(c) || self.is_linebreak(c))
            {
                if self.is_linebreak(c) {
                    skipping = false;
                } else if skipping {
                    i += 1;
                    continue;
                }
                if !token.text.is_empty() || !self.drop_empty {
                    out.push(std::mem::take(&mut token));
                }
            } else if in_quote.is_none() && self.is_capsule_open(c) && !skipping {
                if opens.is_empty() && (!token.text.is_empty() || !self.drop_empty) {
                    if token.text.is_empty() {
                        token.line = line;
                    }
                    out.push(std::mem::take(&mut token));
                    token.line = line;
                }
                opens.push(c);
                if token.text.is_empty() {
                    token.line = line;
                }
                token.text.push(c);
            } else if in_quote.is_none() && self.is_capsule_close(c) && !skipping {
                match opens.last() {
                    Some(&open) if self.closes(open, c) => {}
                    _ => {
                        return Err(format!("line {line}: unexpected '{c}'"));
                    }
                }
                token.text.push(c);
                opens.pop();
                if opens.is_empty() {
                    if token.text.is_empty() {
                        token.line = line;
                    }
                    out.push(std::mem::take(&mut token));
                }
            } else if opens.is_empty() && self.is_quote(c) && !skipping {
                match in_quote {
                    None => {
                        if !token.text.is_empty() || !self.drop_empty {
                            if token.text.is_empty() {
                                token.line = line;
                            }
                            out.push(std::mem::take(&mut token));
                        }
                        in_quote = Some(c);
                    }
                    Some(q) if q == c => {
                        in_quote = None;
                        token.quoted = true;
                        out.push(std::mem::take(&mut token));
                    }
                    Some(_) => token.text.push(c),
                }
            } else if opens.is_empty()
                && in_quote.is_none()
                && self.is_extract(c)
                && !skipping
            {
                if !token.text.is_empty() || !self.drop_empty {
                    out.push(Token::new(std::mem::take(&mut token).text, line));
                }
                out.push(Token::new(c.to_string(), line));
                token = Token::default();
            } else if in_quote.is_none() && self.is_lineskip(c) {
                skipping = true;
            } else if in_quote.is_none() && self.is_linebreak(c) && skipping {
                skipping = false;
            } else if opens.is_empty() && !self.keep_backslashes && c == '\\' {
                match chars.get(i + 1) {
                    Some(&next) => {
                        token.text.push(self.backslash_target(next));
                        i += 1;
                    }
                    None => return Err(format!("line {line}: trailing backslash")),
                }
            } else if !skipping {
                if token.text.is_empty() {
                    token.line = line;
                }
                token.text.push(c);
            }
            i += 1;
        }

        if !opens.is_empty() {
            return Err("unterminated group".to_string());
        }
        if in_quote.is_some() {
            return Err("unterminated string literal".to_string());
        }
        if !token.text.is_empty() {
            out.push(token);
        }
        Ok(out)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
