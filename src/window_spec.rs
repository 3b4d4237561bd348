//! Window specifications: the ordered weights applied around each position.
//!
//! A window is an odd-length sequence of [`WeightEntry`] values. The middle
//! entry sits on the position being computed; the others reach `radius`
//! positions to either side. Entries are either a multiplicative weight or
//! the ignore marker, which removes that offset from the computation
//! entirely (it is not a zero weight).

use ordered_float::OrderedFloat;
use std::fmt;
use std::str::FromStr;

/// One position of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeightEntry {
    /// Multiplicative weight for this offset.
    Weight(OrderedFloat<f64>),
    /// Offset excluded from the computation (`x` in user input).
    Ignore,
}

impl WeightEntry {
    /// Creates a numeric weight entry.
    pub fn weight(value: f64) -> Self {
        WeightEntry::Weight(OrderedFloat(value))
    }

    /// Returns the numeric weight, or `None` for the ignore marker.
    pub fn value(&self) -> Option<f64> {
        match self {
            WeightEntry::Weight(weight) => Some(weight.into_inner()),
            WeightEntry::Ignore => None,
        }
    }

    pub fn is_ignore(&self) -> bool {
        matches!(self, WeightEntry::Ignore)
    }

    /// Parses a literal token: a finite number, or `x` (any case, optionally
    /// quoted) for the ignore marker.
    fn parse_token(position: usize, token: &str) -> Result<Self, WindowError> {
        let cleaned = token
            .trim()
            .trim_matches(|c| c == '\'' || c == '"')
            .trim();

        if cleaned.eq_ignore_ascii_case("x") {
            return Ok(WeightEntry::Ignore);
        }

        match cleaned.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(WeightEntry::weight(value)),
            _ => Err(WindowError::InvalidEntry {
                position,
                token: token.trim().to_string(),
            }),
        }
    }

    /// Parses one character of the compact encoding. Digits `0`..`9` map to
    /// the relative weights `0.1`..`1.0`.
    fn from_compact_char(position: usize, ch: char) -> Result<Self, WindowError> {
        if ch.eq_ignore_ascii_case(&'x') {
            return Ok(WeightEntry::Ignore);
        }

        ch.to_digit(10)
            .map(|digit| WeightEntry::weight((digit as f64 + 1.0) / 10.0))
            .ok_or_else(|| WindowError::InvalidEntry {
                position,
                token: ch.to_string(),
            })
    }
}

impl fmt::Display for WeightEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightEntry::Weight(weight) => write!(f, "{}", weight),
            WeightEntry::Ignore => write!(f, "x"),
        }
    }
}

/// Reasons a window description is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// The window has no entries.
    Empty,
    /// The window has an even number of entries and therefore no center.
    EvenLength(usize),
    /// An entry is neither a finite number nor the ignore marker.
    InvalidEntry { position: usize, token: String },
    /// The description could not be split into entries.
    Malformed(String),
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowError::Empty => write!(f, "Window length is 0"),
            WindowError::EvenLength(len) => write!(
                f,
                "Window length ({}) is even; only odd-length windows centre on a single position",
                len
            ),
            WindowError::InvalidEntry { position, token } => write!(
                f,
                "Window entry {} ({:?}) is neither a number nor the ignore marker 'x'",
                position, token
            ),
            WindowError::Malformed(msg) => write!(f, "Malformed window: {}", msg),
        }
    }
}

impl std::error::Error for WindowError {}

/// A validated, odd-length window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowSpec {
    entries: Vec<WeightEntry>,
}

impl WindowSpec {
    /// Validates a literal sequence of entries.
    ///
    /// # Errors
    /// Returns `WindowError::Empty` or `WindowError::EvenLength` for windows
    /// without a single center, and `WindowError::InvalidEntry` for
    /// non-finite weights.
    pub fn new(entries: Vec<WeightEntry>) -> Result<Self, WindowError> {
        if entries.is_empty() {
            return Err(WindowError::Empty);
        }
        if entries.len() % 2 == 0 {
            return Err(WindowError::EvenLength(entries.len()));
        }

        for (position, entry) in entries.iter().enumerate() {
            if let WeightEntry::Weight(weight) = entry {
                if !weight.is_finite() {
                    return Err(WindowError::InvalidEntry {
                        position,
                        token: weight.to_string(),
                    });
                }
            }
        }

        Ok(WindowSpec { entries })
    }

    /// Builds a window from plain numeric weights (no ignored offsets).
    pub fn from_weights(weights: &[f64]) -> Result<Self, WindowError> {
        Self::new(weights.iter().copied().map(WeightEntry::weight).collect())
    }

    /// Builds a window from literal tokens such as `["2", "x", "2"]`.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self, WindowError> {
        let entries = tokens
            .iter()
            .enumerate()
            .map(|(position, token)| WeightEntry::parse_token(position, token.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(entries)
    }

    /// Parses a window description.
    ///
    /// Accepted forms:
    /// - bracketed list: `"[2, 5, 2]"`, `"[2,'x',2]"`, `"[2, 5, 2,]"` (one
    ///   trailing comma allowed)
    /// - delimited list: `"2,5,2"`, `"0.5 1 0.5"`
    /// - compact string: `"494"`, `"9xxxxx9"`, one character per position,
    ///   digit `d` meaning the weight `(d + 1) / 10`
    ///
    /// `x` marks an ignored position in every form, in either case.
    ///
    /// Text without brackets, commas or whitespace is always read in compact
    /// form, so a single literal weight has to be bracketed: `"[1.5]"` is the
    /// weight 1.5, while `"1.5"` is rejected at the `.`.
    ///
    /// # Examples
    /// ```
    /// use weighslide::window_spec::{WeightEntry, WindowSpec};
    ///
    /// let window = WindowSpec::parse("4x4").unwrap();
    /// assert_eq!(window.len(), 3);
    /// assert_eq!(window.entries()[1], WeightEntry::Ignore);
    /// assert_eq!(window.entries()[0].value(), Some(0.5));
    /// ```
    pub fn parse(input: &str) -> Result<Self, WindowError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(WindowError::Empty);
        }

        if let Some(rest) = trimmed.strip_prefix('[') {
            let inner = rest.strip_suffix(']').ok_or_else(|| {
                WindowError::Malformed(format!("missing closing bracket in {:?}", trimmed))
            })?;
            if inner.trim().is_empty() {
                return Err(WindowError::Empty);
            }
            let mut tokens: Vec<&str> = inner.split(',').collect();
            if tokens.len() > 1 && matches!(tokens.last(), Some(last) if last.trim().is_empty()) {
                tokens.pop();
            }
            return Self::from_tokens(&tokens);
        }

        if trimmed.contains(',') {
            let tokens: Vec<&str> = trimmed.split(',').collect();
            return Self::from_tokens(&tokens);
        }

        if trimmed.contains(char::is_whitespace) {
            let tokens: Vec<&str> = trimmed.split_whitespace().collect();
            return Self::from_tokens(&tokens);
        }

        let entries = trimmed
            .chars()
            .enumerate()
            .map(|(position, ch)| WeightEntry::from_compact_char(position, ch))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(entries)
    }

    /// Number of entries (always odd).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; a validated window holds at least one entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the entry aligned with the position being computed.
    pub fn center(&self) -> usize {
        self.entries.len() / 2
    }

    /// Number of offsets on each side of the center.
    pub fn radius(&self) -> usize {
        (self.entries.len() - 1) / 2
    }

    pub fn entries(&self) -> &[WeightEntry] {
        &self.entries
    }

    /// Entries paired with their offset relative to the center.
    pub fn offsets(&self) -> impl Iterator<Item = (isize, WeightEntry)> + '_ {
        let radius = self.radius() as isize;
        self.entries
            .iter()
            .enumerate()
            .map(move |(index, entry)| (index as isize - radius, *entry))
    }

    /// Weights as floats with ignored offsets rendered as NaN.
    pub fn weights_with_nan(&self) -> Vec<f64> {
        self.entries
            .iter()
            .map(|entry| entry.value().unwrap_or(f64::NAN))
            .collect()
    }

    pub fn ignored_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_ignore()).count()
    }
}

impl FromStr for WindowSpec {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WindowSpec::parse(s)
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (index, entry) in self.entries.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", entry)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_bracketed_list() {
        let window = WindowSpec::parse("[2, 5, 2]").unwrap();
        assert_eq!(window.weights_with_nan(), vec![2.0, 5.0, 2.0]);
        assert_eq!(window.center(), 1);
    }

    #[test]
    fn test_parses_bracketed_list_with_quoted_ignore() {
        let window = WindowSpec::parse("[2,'x',2]").unwrap();
        assert_eq!(window.entries()[1], WeightEntry::Ignore);
        assert_eq!(window.ignored_count(), 1);
    }

    #[test]
    fn test_parses_delimited_lists() {
        let commas = WindowSpec::parse("0.3,1.0,X,1.0,0.3").unwrap();
        assert_eq!(commas.len(), 5);
        assert!(commas.entries()[2].is_ignore());

        let spaces = WindowSpec::parse("0.5 1 0.5").unwrap();
        assert_eq!(spaces.weights_with_nan(), vec![0.5, 1.0, 0.5]);
    }

    #[test]
    fn test_compact_digits_scale_to_relative_weights() {
        let window = WindowSpec::parse("494").unwrap();
        let weights = window.weights_with_nan();
        assert!((weights[0] - 0.5).abs() < 1e-12);
        assert!((weights[1] - 1.0).abs() < 1e-12);
        assert!((weights[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_compact_ignore_marker_is_case_insensitive() {
        let window = WindowSpec::parse("9X0x9").unwrap();
        assert_eq!(window.ignored_count(), 2);
        assert_eq!(window.entries()[2].value(), Some(0.1));
    }

    #[test]
    fn test_rejects_even_and_empty_windows() {
        assert_eq!(WindowSpec::parse("44"), Err(WindowError::EvenLength(2)));
        assert_eq!(WindowSpec::parse("[1, 2, 3, 4]"), Err(WindowError::EvenLength(4)));
        assert_eq!(WindowSpec::parse(""), Err(WindowError::Empty));
        assert_eq!(WindowSpec::parse("[]"), Err(WindowError::Empty));
        assert_eq!(WindowSpec::new(Vec::new()), Err(WindowError::Empty));
    }

    #[test]
    fn test_rejects_unparseable_entries() {
        let err = WindowSpec::parse("4y4").unwrap_err();
        assert_eq!(
            err,
            WindowError::InvalidEntry {
                position: 1,
                token: "y".to_string()
            }
        );
        assert!(matches!(
            WindowSpec::parse("[1, abc, 1]"),
            Err(WindowError::InvalidEntry { position: 1, .. })
        ));
        assert!(matches!(
            WindowSpec::parse("1,,1"),
            Err(WindowError::InvalidEntry { position: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_non_finite_weights() {
        assert!(WindowSpec::parse("[1, inf, 1]").is_err());
        assert!(WindowSpec::parse("[1, NaN, 1]").is_err());
        assert!(WindowSpec::from_weights(&[1.0, f64::NAN, 1.0]).is_err());
    }

    #[test]
    fn test_bracketed_list_allows_one_trailing_comma() {
        let window = WindowSpec::parse("[1, 2, 3,]").unwrap();
        assert_eq!(window.weights_with_nan(), vec![1.0, 2.0, 3.0]);
        assert_eq!(WindowSpec::parse("[1.5,]").unwrap().len(), 1);

        assert!(matches!(
            WindowSpec::parse("[1, 2, 3,,]"),
            Err(WindowError::InvalidEntry { position: 3, .. })
        ));
        assert!(matches!(
            WindowSpec::parse("[,]"),
            Err(WindowError::InvalidEntry { position: 0, .. })
        ));
    }

    #[test]
    fn test_bare_decimal_is_read_as_compact() {
        assert_eq!(
            WindowSpec::parse("1.5"),
            Err(WindowError::InvalidEntry {
                position: 1,
                token: ".".to_string()
            })
        );
        let window = WindowSpec::parse("[1.5]").unwrap();
        assert_eq!(window.entries()[0].value(), Some(1.5));
    }

    #[test]
    fn test_rejects_unclosed_bracket() {
        assert!(matches!(
            WindowSpec::parse("[1, 2, 1"),
            Err(WindowError::Malformed(_))
        ));
    }

    #[test]
    fn test_offsets_are_centered() {
        let window = WindowSpec::parse("12345").unwrap();
        let offsets: Vec<isize> = window.offsets().map(|(offset, _)| offset).collect();
        assert_eq!(offsets, vec![-2, -1, 0, 1, 2]);
        assert_eq!(window.radius(), 2);
    }

    #[test]
    fn test_single_entry_window_is_valid() {
        let window = WindowSpec::parse("[3]").unwrap();
        assert_eq!(window.center(), 0);
        assert_eq!(window.radius(), 0);
    }

    #[test]
    fn test_display_uses_bracketed_form() {
        let window = WindowSpec::parse("[2, x, 2.5]").unwrap();
        assert_eq!(window.to_string(), "[2, x, 2.5]");
        assert_eq!(window.to_string().parse::<WindowSpec>().unwrap(), window);
    }
}
