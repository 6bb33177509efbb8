use std::io::Write;
use std::iter::Peekable;

use crate::models::{DtHeader, DtLine, DtPair, PhaseTag};

/// First character of a pair header line
pub const HEADER_MARKER: char = '#';

#[inline]
pub fn is_header(line: &str) -> bool {
    line.starts_with(HEADER_MARKER)
}

/// A header line with the data lines that follow it, untouched
#[derive(Debug, Clone, PartialEq)]
pub struct RawPair<'a> {
    pub header: &'a str,
    pub body: Vec<&'a str>,
}

/// Groups a line stream into header runs
///
/// Data lines that appear before the first header belong to no pair; they
/// are skipped and counted in `orphans`. Blank lines are ignored.
pub struct PairGroups<'a, I: Iterator<Item = &'a str>> {
    lines: Peekable<I>,
    lines_read: usize,
    orphans: usize,
}

impl<'a, I: Iterator<Item = &'a str>> PairGroups<'a, I> {
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    pub fn orphans(&self) -> usize {
        self.orphans
    }
}

impl<'a, I: Iterator<Item = &'a str>> Iterator for PairGroups<'a, I> {
    type Item = RawPair<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.lines_read += 1;

            if is_header(line) {
                let mut body = Vec::new();
                while let Some(data) = self.lines.next_if(|l| !is_header(l)) {
                    self.lines_read += 1;
                    if !data.trim().is_empty() {
                        body.push(data);
                    }
                }
                return Some(RawPair { header: line, body });
            }

            if !line.trim().is_empty() {
                self.orphans += 1;
            }
        }
    }
}

pub fn group_pairs<'a, I>(lines: I) -> PairGroups<'a, I::IntoIter>
where
    I: IntoIterator<Item = &'a str>,
{
    PairGroups {
        lines: lines.into_iter().peekable(),
        lines_read: 0,
        orphans: 0,
    }
}

/// `# observed_id reference_id [otc]`
pub fn parse_header(line: &str) -> Result<DtHeader, String> {
    let mut codes = line
        .strip_prefix(HEADER_MARKER)
        .ok_or_else(|| "missing header marker".to_string())?
        .split_whitespace();

    match (codes.next(), codes.next()) {
        (Some(observed), Some(reference)) => Ok(DtHeader {
            observed_id: observed.to_string(),
            reference_id: reference.to_string(),
            raw: line.trim_end().to_string(),
        }),
        _ => Err(format!("header '{}' lacks two event ids", line.trim())),
    }
}

/// `station dt weight [...] phase`
pub fn parse_data_line(line: &str) -> Result<DtLine, String> {
    let codes: Vec<&str> = line.split_whitespace().collect();
    if codes.len() < 4 {
        return Err(format!("data line has {} fields, expected at least 4", codes.len()));
    }

    let dt: f64 = codes[1].parse().map_err(|_| format!("bad dt '{}'", codes[1]))?;
    let weight: f64 = codes[2].parse().map_err(|_| format!("bad weight '{}'", codes[2]))?;
    if !dt.is_finite() || !weight.is_finite() {
        return Err("non-finite dt or weight".to_string());
    }
    let phase: PhaseTag = codes[codes.len() - 1].parse()?;

    Ok(DtLine {
        station: codes[0].to_string(),
        dt,
        weight,
        phase,
        raw: line.trim_end().to_string(),
    })
}

/// Write pairs back in the input line format
pub fn write_pairs<W: Write>(writer: &mut W, pairs: &[DtPair]) -> std::io::Result<()> {
    for pair in pairs {
        writeln!(writer, "{}", pair.header.raw)?;
        for line in &pair.lines {
            writeln!(writer, "{}", line.raw)?;
        }
    }
    Ok(())
}

/// Parse a selected dt file into typed pairs, dropping anything malformed
pub fn read_pairs(text: &str) -> Vec<DtPair> {
    group_pairs(text.lines())
        .filter_map(|raw| {
            let header = parse_header(raw.header).ok()?;
            let lines = raw.body.iter().filter_map(|l| parse_data_line(l).ok()).collect();
            Some(DtPair { header, lines })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: &str = "\
CI.CLC 0.1 0.9 P
# 1 2 0.0
CI.CLC   0.030 0.812 P
CI.SLA  -0.120 0.701 S

#  1  3  0.0
# 2 3 0.0
CI.WRC2 0.2 0.6 P
";

    #[test]
    fn test_grouping_follows_headers() {
        let mut groups = group_pairs(DT.lines());
        let pairs: Vec<RawPair> = groups.by_ref().collect();

        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].header, "# 1 2 0.0");
        assert_eq!(pairs[0].body.len(), 2);
        assert!(pairs[1].body.is_empty());
        assert_eq!(pairs[2].body, vec!["CI.WRC2 0.2 0.6 P"]);
        assert_eq!(groups.orphans(), 1);
        assert_eq!(groups.lines_read(), 8);
    }

    #[test]
    fn test_parse_header() {
        let header = parse_header("#  1  3  0.0").unwrap();
        assert_eq!(header.observed_id, "1");
        assert_eq!(header.reference_id, "3");
        assert!(parse_header("# 17").is_err());
    }

    #[test]
    fn test_parse_data_line() {
        let line = parse_data_line("CI.SLA  -0.120 0.701 S").unwrap();
        assert_eq!(line.station, "CI.SLA");
        assert_eq!(line.dt, -0.12);
        assert_eq!(line.weight, 0.701);
        assert_eq!(line.phase, PhaseTag::S);
        assert_eq!(line.raw, "CI.SLA  -0.120 0.701 S");
    }

    #[test]
    fn test_parse_data_line_errors() {
        assert!(parse_data_line("CI.SLA abc 0.7 P").is_err());
        assert!(parse_data_line("CI.SLA 0.1 0.7 X").is_err());
        assert!(parse_data_line("CI.SLA 0.1 P").is_err());
        assert!(parse_data_line("CI.SLA NaN 0.7 P").is_err());
    }

    #[test]
    fn test_read_and_write_pairs() {
        let pairs = read_pairs(DT);
        assert_eq!(pairs.len(), 3);

        let mut out = Vec::new();
        write_pairs(&mut out, &pairs[..1]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "# 1 2 0.0\nCI.CLC   0.030 0.812 P\nCI.SLA  -0.120 0.701 S\n"
        );
    }
}
