use crate::error::{Error, Pos, QuillResult, Span};
use crate::token::{lookup_keyword, Token, TokenKind};

pub struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
    line: u32,
    col: u32,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn tokenize(&mut self) -> QuillResult<Vec<Token>> {
        let mut tokens = Vec::with_capacity(self.source.len() / 4);

        loop {
            self.skip_whitespace_and_comments();

            if self.is_at_end() {
                let here = self.here();
                tokens.push(Token::new(TokenKind::Eof, Span::new(here, here)));
                break;
            }

            let token = self.scan_token()?;
            tokens.push(token);
        }

        log::debug!("lexed {} tokens", tokens.len());
        Ok(tokens)
    }

    fn scan_token(&mut self) -> QuillResult<Token> {
        let start = self.here();
        let byte = self.advance();

        let kind = match byte {
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b';' => TokenKind::Semicolon,
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'=' => TokenKind::Eq,

            b'0'..=b'9' => self.scan_number(start)?,

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_identifier(start),

            _ => {
                // Consume the rest of a multi-byte character so the span
                // stays on a char boundary.
                while !self.is_at_end() && (self.peek() & 0xC0) == 0x80 {
                    self.pos += 1;
                }
                let shown = String::from_utf8_lossy(&self.source[start.index..self.pos]);
                return Err(Error::lexer(
                    format!("unexpected character: '{}'", shown),
                    Span::new(start, self.here()),
                ));
            }
        };

        Ok(Token::new(kind, Span::new(start, self.here())))
    }

    fn scan_number(&mut self, start: Pos) -> QuillResult<TokenKind> {
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            self.advance();
        }

        let text = self.text_from(start);
        if text.parse::<i64>().is_err() {
            return Err(Error::lexer(
                format!("integer literal out of range: {}", text),
                Span::new(start, self.here()),
            ));
        }

        Ok(TokenKind::Int(text.to_string()))
    }

    fn scan_identifier(&mut self, start: Pos) -> TokenKind {
        while !self.is_at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == b'_') {
            self.advance();
        }

        let text = self.text_from(start);
        match lookup_keyword(text) {
            Some(keyword) => keyword,
            None => TokenKind::Ident(text.to_string()),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while !self.is_at_end() && self.peek().is_ascii_whitespace() {
                self.advance();
            }

            if self.pos + 1 < self.source.len()
                && self.source[self.pos] == b'/'
                && self.source[self.pos + 1] == b'/'
            {
                let remaining = &self.source[self.pos..];
                match memchr::memchr(b'\n', remaining) {
                    Some(offset) => {
                        self.pos += offset;
                        self.col += offset as u32;
                    }
                    None => {
                        let skip = self.source.len() - self.pos;
                        self.col += skip as u32;
                        self.pos = self.source.len();
                    }
                }
                continue;
            }

            break;
        }
    }

    /// Source text from `start` up to the current position. Only called on
    /// ASCII runs, so the slice is always valid UTF-8.
    fn text_from(&self, start: Pos) -> &'src str {
        let source: &'src [u8] = self.source;
        std::str::from_utf8(&source[start.index..self.pos]).unwrap_or("")
    }

    #[inline(always)]
    fn here(&self) -> Pos {
        Pos::new(self.pos, self.line, self.col)
    }

    #[inline(always)]
    fn peek(&self) -> u8 {
        self.source[self.pos]
    }

    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let byte = self.source[self.pos];
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        byte
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }
}
