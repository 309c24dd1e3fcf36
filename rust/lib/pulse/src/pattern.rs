/// One pattern or a list of patterns.
///
/// Registration and removal accept either; a list applies the same listener
/// to each pattern independently.
pub trait IntoPatterns {
    fn into_patterns(self) -> Vec<String>;
}

impl IntoPatterns for &str {
    fn into_patterns(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoPatterns for String {
    fn into_patterns(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoPatterns for &String {
    fn into_patterns(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl IntoPatterns for &[&str] {
    fn into_patterns(self) -> Vec<String> {
        self.iter().map(|p| p.to_string()).collect()
    }
}

impl IntoPatterns for &[String] {
    fn into_patterns(self) -> Vec<String> {
        self.to_vec()
    }
}

impl<const N: usize> IntoPatterns for [&str; N] {
    fn into_patterns(self) -> Vec<String> {
        self.iter().map(|p| p.to_string()).collect()
    }
}

impl IntoPatterns for Vec<&str> {
    fn into_patterns(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoPatterns for Vec<String> {
    fn into_patterns(self) -> Vec<String> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pattern() {
        assert_eq!("a.b".into_patterns(), vec!["a.b"]);
        assert_eq!(String::from("a.b").into_patterns(), vec!["a.b"]);
    }

    #[test]
    fn pattern_lists() {
        assert_eq!(["a", "b.*"].into_patterns(), vec!["a", "b.*"]);
        assert_eq!(vec!["x.**"].into_patterns(), vec!["x.**"]);

        let owned = vec!["p".to_string(), "q".to_string()];
        assert_eq!(owned.as_slice().into_patterns(), vec!["p", "q"]);
    }

    #[test]
    fn empty_list_is_empty() {
        let none: Vec<String> = Vec::new();
        assert!(none.into_patterns().is_empty());
    }
}
