//! 键匹配模式
//!
//! 只支持字面量和 `*`（任意长度字符）两种片段。字面量在渲染成 Redis glob
//! 或 SQL LIKE 时会被转义，所以用户输入永远只按字面匹配。

use std::fmt;

/// 模式片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternToken {
    Literal(String),
    Any,
}

/// 键匹配模式
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPattern {
    tokens: Vec<PatternToken>,
}

impl KeyPattern {
    /// 精确匹配
    pub fn exact(key: impl Into<String>) -> Self {
        Self::default().then_literal(key)
    }

    /// 前缀匹配，等价于 `<prefix>*`
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self::default().then_literal(prefix).then_any()
    }

    /// 追加字面量
    pub fn then_literal(mut self, literal: impl Into<String>) -> Self {
        let literal = literal.into();
        if literal.is_empty() {
            return self;
        }
        match self.tokens.last_mut() {
            Some(PatternToken::Literal(last)) => last.push_str(&literal),
            _ => self.tokens.push(PatternToken::Literal(literal)),
        }
        self
    }

    /// 追加通配符
    pub fn then_any(mut self) -> Self {
        if self.tokens.last() != Some(&PatternToken::Any) {
            self.tokens.push(PatternToken::Any);
        }
        self
    }

    /// 在模式前加上物理键前缀
    pub fn with_key_prefix(&self, prefix: &str) -> Self {
        let mut pattern = Self::default().then_literal(prefix);
        for token in &self.tokens {
            pattern = match token {
                PatternToken::Literal(s) => pattern.then_literal(s.clone()),
                PatternToken::Any => pattern.then_any(),
            };
        }
        pattern
    }

    pub fn tokens(&self) -> &[PatternToken] {
        &self.tokens
    }

    /// 不含通配符时返回对应的精确键
    pub fn as_exact(&self) -> Option<&str> {
        match self.tokens.as_slice() {
            [PatternToken::Literal(key)] => Some(key),
            _ => None,
        }
    }

    /// 判断键是否匹配
    pub fn matches(&self, key: &str) -> bool {
        let mut rest = key;
        let mut anchored = true;
        let last = self.tokens.len().saturating_sub(1);

        for (idx, token) in self.tokens.iter().enumerate() {
            match token {
                PatternToken::Any => anchored = false,
                PatternToken::Literal(literal) => {
                    if anchored {
                        match rest.strip_prefix(literal.as_str()) {
                            Some(tail) => rest = tail,
                            None => return false,
                        }
                    } else if idx == last {
                        return rest.ends_with(literal.as_str());
                    } else {
                        match rest.find(literal.as_str()) {
                            Some(pos) => rest = &rest[pos + literal.len()..],
                            None => return false,
                        }
                    }
                    anchored = true;
                }
            }
        }

        !anchored || rest.is_empty()
    }

    /// 渲染为 Redis `SCAN MATCH` 使用的 glob
    pub fn to_glob(&self) -> String {
        let mut glob = String::new();
        for token in &self.tokens {
            match token {
                PatternToken::Any => glob.push('*'),
                PatternToken::Literal(literal) => {
                    for c in literal.chars() {
                        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
                            glob.push('\\');
                        }
                        glob.push(c);
                    }
                }
            }
        }
        glob
    }

    /// 渲染为 SQL `LIKE ... ESCAPE '\'` 使用的模式
    pub fn to_like(&self) -> String {
        let mut like = String::new();
        for token in &self.tokens {
            match token {
                PatternToken::Any => like.push('%'),
                PatternToken::Literal(literal) => {
                    for c in literal.chars() {
                        if matches!(c, '%' | '_' | '\\') {
                            like.push('\\');
                        }
                        like.push(c);
                    }
                }
            }
        }
        like
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_glob())
    }
}
