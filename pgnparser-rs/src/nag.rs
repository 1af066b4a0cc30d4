//! Numeric annotation glyphs: `$1`, `!?`, `±` and friends.

use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// A numeric annotation glyph like `?`, `!!` or `$42`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Nag(pub u8);

/// How to write a [`Nag`] for people.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum NagFormat {
    /// `$1`, `$2` and so on.
    Numeric,
    /// The traditional symbol (`?`, `!!`, `±`), or the detailed text when
    /// there is none.
    #[default]
    Brief,
    /// A sentence describing the annotation.
    Detailed,
}

impl FromStr for NagFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<NagFormat, String> {
        match s {
            "numeric" => Ok(NagFormat::Numeric),
            "brief" => Ok(NagFormat::Brief),
            "detailed" => Ok(NagFormat::Detailed),
            _ => Err(format!("unknown NAG format {s:?}")),
        }
    }
}

// symbolic suffixes and the codes they stand for; longest first where one is
// a prefix of another
const GLYPHS: &[(&str, u8)] = &[
    ("!!", 3),
    ("??", 4),
    ("!?", 5),
    ("?!", 6),
    ("!", 1),
    ("?", 2),
    ("+/=", 14),
    ("=/+", 15),
    ("+/-", 16),
    ("-/+", 17),
    ("+=", 14),
    ("=+", 15),
    ("+-", 18),
    ("-+", 19),
    ("=", 10),
    ("\u{221e}", 13),
    ("\u{2a72}", 14),
    ("\u{2a71}", 15),
    ("\u{b1}", 16),
    ("\u{2213}", 17),
];

// the brief form of the codes which have a traditional symbol
const BRIEF: &[(u8, &str)] = &[
    (1, "!"),
    (2, "?"),
    (3, "!!"),
    (4, "??"),
    (5, "!?"),
    (6, "?!"),
    (7, "\u{25a1}"),
    (10, "="),
    (13, "\u{221e}"),
    (14, "\u{2a72}"),
    (15, "\u{2a71}"),
    (16, "\u{b1}"),
    (17, "\u{2213}"),
    (18, "+-"),
    (19, "-+"),
    (22, "\u{2a00}"),
    (23, "\u{2a00}"),
    (32, "\u{27f3}"),
    (33, "\u{27f3}"),
    (36, "\u{2191}"),
    (37, "\u{2191}"),
    (40, "\u{2192}"),
    (41, "\u{2192}"),
    (132, "\u{21c6}"),
    (133, "\u{21c6}"),
    (138, "\u{2295}"),
    (139, "\u{2295}"),
];

const DETAILED: [&str; 140] = [
    "Null annotation",
    "Good move",
    "Poor move",
    "Very good move",
    "Very poor move",
    "Speculative move",
    "Questionable move",
    "Forced move (all others lose quickly)",
    "Singular move (no reasonable alternatives)",
    "Worst move",
    "Drawish position",
    "Equal chances, quiet position",
    "Equal chances, active position",
    "Unclear position",
    "White has a slight advantage",
    "Black has a slight advantage",
    "White has a moderate advantage",
    "Black has a moderate advantage",
    "White has a decisive advantage",
    "Black has a decisive advantage",
    "White has a crushing advantage (Black should resign)",
    "Black has a crushing advantage (White should resign)",
    "White is in zugzwang",
    "Black is in zugzwang",
    "White has a slight space advantage",
    "Black has a slight space advantage",
    "White has a moderate space advantage",
    "Black has a moderate space advantage",
    "White has a decisive space advantage",
    "Black has a decisive space advantage",
    "White has a slight time (development) advantage",
    "Black has a slight time (development) advantage",
    "White has a moderate time (development) advantage",
    "Black has a moderate time (development) advantage",
    "White has a decisive time (development) advantage",
    "Black has a decisive time (development) advantage",
    "White has the initiative",
    "Black has the initiative",
    "White has a lasting initiative",
    "Black has a lasting initiative",
    "White has the attack",
    "Black has the attack",
    "White has insufficient compensation for material deficit",
    "Black has insufficient compensation for material deficit",
    "White has sufficient compensation for material deficit",
    "Black has sufficient compensation for material deficit",
    "White has more than adequate compensation for material deficit",
    "Black has more than adequate compensation for material deficit",
    "White has a slight center control advantage",
    "Black has a slight center control advantage",
    "White has a moderate center control advantage",
    "Black has a moderate center control advantage",
    "White has a decisive center control advantage",
    "Black has a decisive center control advantage",
    "White has a slight kingside control advantage",
    "Black has a slight kingside control advantage",
    "White has a moderate kingside control advantage",
    "Black has a moderate kingside control advantage",
    "White has a decisive kingside control advantage",
    "Black has a decisive kingside control advantage",
    "White has a slight queenside control advantage",
    "Black has a slight queenside control advantage",
    "White has a moderate queenside control advantage",
    "Black has a moderate queenside control advantage",
    "White has a decisive queenside control advantage",
    "Black has a decisive queenside control advantage",
    "White has a vulnerable first rank",
    "Black has a vulnerable first rank",
    "White has a well protected first rank",
    "Black has a well protected first rank",
    "White has a poorly protected king",
    "Black has a poorly protected king",
    "White has a well protected king",
    "Black has a well protected king",
    "White has a poorly placed king",
    "Black has a poorly placed king",
    "White has a well placed king",
    "Black has a well placed king",
    "White has a very weak pawn structure",
    "Black has a very weak pawn structure",
    "White has a moderately weak pawn structure",
    "Black has a moderately weak pawn structure",
    "White has a moderately strong pawn structure",
    "Black has a moderately strong pawn structure",
    "White has a very strong pawn structure",
    "Black has a very strong pawn structure",
    "White has poor knight placement",
    "Black has poor knight placement",
    "White has good knight placement",
    "Black has good knight placement",
    "White has poor bishop placement",
    "Black has poor bishop placement",
    "White has good bishop placement",
    "Black has good bishop placement",
    "White has poor rook placement",
    "Black has poor rook placement",
    "White has good rook placement",
    "Black has good rook placement",
    "White has poor queen placement",
    "Black has poor queen placement",
    "White has good queen placement",
    "Black has good queen placement",
    "White has poor piece coordination",
    "Black has poor piece coordination",
    "White has good piece coordination",
    "Black has good piece coordination",
    "White has played the opening very poorly",
    "Black has played the opening very poorly",
    "White has played the opening poorly",
    "Black has played the opening poorly",
    "White has played the opening well",
    "Black has played the opening well",
    "White has played the opening very well",
    "Black has played the opening very well",
    "White has played the middlegame very poorly",
    "Black has played the middlegame very poorly",
    "White has played the middlegame poorly",
    "Black has played the middlegame poorly",
    "White has played the middlegame well",
    "Black has played the middlegame well",
    "White has played the middlegame very well",
    "Black has played the middlegame very well",
    "White has played the ending very poorly",
    "Black has played the ending very poorly",
    "White has played the ending poorly",
    "Black has played the ending poorly",
    "White has played the ending well",
    "Black has played the ending well",
    "White has played the ending very well",
    "Black has played the ending very well",
    "White has slight counterplay",
    "Black has slight counterplay",
    "White has moderate counterplay",
    "Black has moderate counterplay",
    "White has decisive counterplay",
    "Black has decisive counterplay",
    "White has moderate time control pressure",
    "Black has moderate time control pressure",
    "White has severe time control pressure",
    "Black has severe time control pressure",
];

impl Nag {
    /// Tries to parse a NAG from the bytes of a PGN token.
    ///
    /// # Examples
    ///
    /// ```
    /// use pgnparser_rs::Nag;
    ///
    /// assert_eq!(Nag::from_ascii(b"??"), Ok(Nag(4)));
    /// assert_eq!(Nag::from_ascii(b"$24"), Ok(Nag(24)));
    /// assert_eq!(Nag::from_ascii("±".as_bytes()), Ok(Nag(16)));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an [`InvalidNag`] error if the input is neither a known glyph
    /// nor a valid numeric annotation (`$0`, ..., `$255`).
    pub fn from_ascii(s: &[u8]) -> Result<Nag, InvalidNag> {
        if let [b'$', digits @ ..] = s {
            if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
                return Err(InvalidNag);
            }
            return std::str::from_utf8(digits)
                .ok()
                .and_then(|digits| digits.parse().ok())
                .map(Nag)
                .ok_or(InvalidNag);
        }
        GLYPHS
            .iter()
            .find(|(glyph, _)| glyph.as_bytes() == s)
            .map(|&(_, code)| Nag(code))
            .ok_or(InvalidNag)
    }

    /// The longest known glyph at the start of `s`, with its length in bytes.
    pub(crate) fn glyph_prefix(s: &[u8]) -> Option<(Nag, usize)> {
        GLYPHS
            .iter()
            .filter(|(glyph, _)| s.starts_with(glyph.as_bytes()))
            .max_by_key(|(glyph, _)| glyph.len())
            .map(|&(glyph, code)| (Nag(code), glyph.len()))
    }

    /// Writes the annotation in the given format.
    #[must_use]
    pub fn render(self, fmt: NagFormat) -> Cow<'static, str> {
        let detailed = || match DETAILED.get(usize::from(self.0)) {
            Some(&text) => Cow::Borrowed(text),
            None => Cow::Owned(format!("Reserved annotation {self}")),
        };
        match fmt {
            NagFormat::Numeric => Cow::Owned(self.to_string()),
            NagFormat::Brief => BRIEF
                .iter()
                .find(|&&(code, _)| code == self.0)
                .map_or_else(detailed, |&(_, brief)| Cow::Borrowed(brief)),
            NagFormat::Detailed => detailed(),
        }
    }

    /// A good move (`!`).
    pub const GOOD_MOVE: Nag = Nag(1);

    /// A mistake (`?`).
    pub const MISTAKE: Nag = Nag(2);

    /// A brilliant move (`!!`).
    pub const BRILLIANT_MOVE: Nag = Nag(3);

    /// A blunder (`??`).
    pub const BLUNDER: Nag = Nag(4);

    /// A speculative move (`!?`).
    pub const SPECULATIVE_MOVE: Nag = Nag(5);

    /// A dubious move (`?!`).
    pub const DUBIOUS_MOVE: Nag = Nag(6);
}

impl fmt::Display for Nag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

impl From<u8> for Nag {
    fn from(nag: u8) -> Nag {
        Nag(nag)
    }
}

impl From<Nag> for u8 {
    fn from(Nag(nag): Nag) -> u8 {
        nag
    }
}

impl FromStr for Nag {
    type Err = InvalidNag;

    fn from_str(s: &str) -> Result<Nag, InvalidNag> {
        Nag::from_ascii(s.as_bytes())
    }
}

/// Error when parsing an invalid NAG.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct InvalidNag;

impl fmt::Display for InvalidNag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid nag")
    }
}

impl Error for InvalidNag {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric() {
        assert_eq!(Nag::from_ascii(b"$0"), Ok(Nag(0)));
        assert_eq!(Nag::from_ascii(b"$139"), Ok(Nag(139)));
        assert_eq!(Nag::from_ascii(b"$255"), Ok(Nag(255)));
        assert_eq!(Nag::from_ascii(b"$256"), Err(InvalidNag));
        assert_eq!(Nag::from_ascii(b"$"), Err(InvalidNag));
        assert_eq!(Nag::from_ascii(b"$+1"), Err(InvalidNag));
    }

    #[test]
    fn glyphs() {
        assert_eq!(Nag::from_ascii(b"+/="), Ok(Nag(14)));
        assert_eq!(Nag::from_ascii(b"=+"), Ok(Nag(15)));
        assert_eq!(Nag::from_ascii(b"-+"), Ok(Nag(19)));
        assert_eq!(Nag::from_ascii("∞".as_bytes()), Ok(Nag(13)));
        assert_eq!(Nag::from_ascii(b"!!!"), Err(InvalidNag));
        assert_eq!(Nag::glyph_prefix(b"!?e5"), Some((Nag(5), 2)));
        assert_eq!(Nag::glyph_prefix(b"+/-)"), Some((Nag(16), 3)));
        assert_eq!(Nag::glyph_prefix(b"e4"), None);
    }

    #[test]
    fn formats() {
        assert_eq!(Nag(3).render(NagFormat::Numeric), "$3");
        assert_eq!(Nag(3).render(NagFormat::Brief), "!!");
        assert_eq!(Nag(3).render(NagFormat::Detailed), "Very good move");
        // no symbol, so brief falls back to the description
        assert_eq!(Nag(8).render(NagFormat::Brief), "Singular move (no reasonable alternatives)");
        assert_eq!(Nag(139).render(NagFormat::Detailed), "Black has severe time control pressure");
        assert_eq!(Nag(200).render(NagFormat::Brief), "Reserved annotation $200");
        assert_eq!("detailed".parse(), Ok(NagFormat::Detailed));
    }
}
