//! LQL request parsing: `GET <table>` plus header lines into a [`Query`].

use crate::error::LqlError;
use crate::filter::{combine, Filter, LeafFilter};
use crate::format::{OutputFormat, ResponseHeader};
use crate::stats::{combine_stats, Stat};

/// One sort specification: `Sort: <column> [asc|desc]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: String,
    pub descending: bool,
}

/// A parsed LQL query.
#[derive(Debug, Clone)]
pub struct Query {
    pub table: String,
    /// Requested columns; empty means all of the table's columns.
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub stats: Vec<Stat>,
    pub sorts: Vec<SortSpec>,
    /// -1 = no limit.
    pub limit: i64,
    pub offset: usize,
    pub output_format: OutputFormat,
    pub response_header: ResponseHeader,
    pub keep_alive: bool,
    pub column_headers: bool,
    pub auth_user: Option<String>,
}

impl Query {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            filters: Vec::new(),
            stats: Vec::new(),
            sorts: Vec::new(),
            limit: -1,
            offset: 0,
            output_format: OutputFormat::Csv,
            response_header: ResponseHeader::Off,
            keep_alive: false,
            column_headers: false,
            auth_user: None,
        }
    }

    /// Parse request lines (the `GET` line plus headers, blank line and
    /// framing already stripped).
    ///
    /// On error the returned [`ParseFailure`] still carries any
    /// `KeepAlive: on` and `ResponseHeader:` values recognized before the
    /// error, so the server can honor them for the error response.
    pub fn parse(lines: &[String]) -> Result<Self, ParseFailure> {
        let mut keep_alive = false;
        let mut response_header = ResponseHeader::Off;
        Self::parse_inner(lines, &mut keep_alive, &mut response_header).map_err(|error| {
            ParseFailure {
                error,
                keep_alive,
                response_header,
            }
        })
    }

    #[allow(clippy::too_many_lines)]
    fn parse_inner(
        lines: &[String],
        keep_alive: &mut bool,
        response_header: &mut ResponseHeader,
    ) -> Result<Self, LqlError> {
        let first = lines
            .first()
            .ok_or_else(|| LqlError::Parse("empty request".to_string()))?;
        let table = first
            .strip_prefix("GET ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| LqlError::Parse(format!("expected GET <table>, got {first:?}")))?;

        let mut query = Self::new(table);
        let mut filter_stack: Vec<Filter> = Vec::new();

        for line in &lines[1..] {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| LqlError::Parse(format!("malformed header: {line:?}")))?;
            let value = value.trim();
            match key {
                "Columns" => {
                    query.columns = value.split_whitespace().map(str::to_string).collect();
                }
                "Filter" => filter_stack.push(Filter::Leaf(LeafFilter::parse(value)?)),
                "And" => combine(&mut filter_stack, parse_count(key, value)?, true)?,
                "Or" => combine(&mut filter_stack, parse_count(key, value)?, false)?,
                "Negate" => {
                    let last = filter_stack
                        .pop()
                        .ok_or_else(|| LqlError::Parse("Negate: with no filter".to_string()))?;
                    filter_stack.push(Filter::Negate(Box::new(last)));
                }
                "Stats" => query.stats.push(Stat::parse(value)?),
                "StatsAnd" => combine_stats(&mut query.stats, parse_count(key, value)?, true)?,
                "StatsOr" => combine_stats(&mut query.stats, parse_count(key, value)?, false)?,
                "Sort" => {
                    let mut parts = value.split_whitespace();
                    let column = parts
                        .next()
                        .ok_or_else(|| LqlError::Parse("Sort: missing column".to_string()))?
                        .to_string();
                    let descending = match parts.next() {
                        None | Some("asc") => false,
                        Some("desc") => true,
                        Some(other) => {
                            return Err(LqlError::Parse(format!(
                                "Sort: expected asc or desc, got {other:?}"
                            )));
                        }
                    };
                    query.sorts.push(SortSpec { column, descending });
                }
                "Limit" => {
                    query.limit = value
                        .parse()
                        .map_err(|_| LqlError::Parse(format!("bad Limit: {value:?}")))?;
                }
                "Offset" => {
                    query.offset = value
                        .parse()
                        .map_err(|_| LqlError::Parse(format!("bad Offset: {value:?}")))?;
                }
                "OutputFormat" => {
                    query.output_format = OutputFormat::parse(value)
                        .ok_or_else(|| LqlError::Parse(format!("bad OutputFormat: {value:?}")))?;
                }
                "ResponseHeader" => {
                    query.response_header = ResponseHeader::parse(value)
                        .ok_or_else(|| LqlError::Parse(format!("bad ResponseHeader: {value:?}")))?;
                    *response_header = query.response_header;
                }
                "KeepAlive" => {
                    query.keep_alive = value == "on";
                    *keep_alive = query.keep_alive;
                }
                "ColumnHeaders" => query.column_headers = value == "on",
                "AuthUser" => query.auth_user = Some(value.to_string()),
                // Harmless headers some clients always send.
                "Localtime" | "Timelimit" => {}
                other => {
                    return Err(LqlError::Parse(format!("unknown header: {other:?}")));
                }
            }
        }

        query.filters = filter_stack;
        Ok(query)
    }

    /// Re-emit the request in canonical form. `parse(serialize(q))` yields
    /// an equal parse tree.
    pub fn serialize(&self) -> Vec<String> {
        let mut out = vec![format!("GET {}", self.table)];
        if !self.columns.is_empty() {
            out.push(format!("Columns: {}", self.columns.join(" ")));
        }
        for f in &self.filters {
            f.render("Filter", &mut out);
        }
        for s in &self.stats {
            s.render(&mut out);
        }
        for s in &self.sorts {
            out.push(format!(
                "Sort: {} {}",
                s.column,
                if s.descending { "desc" } else { "asc" }
            ));
        }
        if self.limit >= 0 {
            out.push(format!("Limit: {}", self.limit));
        }
        if self.offset > 0 {
            out.push(format!("Offset: {}", self.offset));
        }
        out.push(format!("OutputFormat: {}", self.output_format.name()));
        if self.response_header == ResponseHeader::Fixed16 {
            out.push("ResponseHeader: fixed16".to_string());
        }
        if self.keep_alive {
            out.push("KeepAlive: on".to_string());
        }
        if self.column_headers {
            out.push("ColumnHeaders: on".to_string());
        }
        if let Some(user) = &self.auth_user {
            out.push(format!("AuthUser: {user}"));
        }
        out
    }
}

/// A parse error plus the connection-affecting headers seen before it.
#[derive(Debug)]
pub struct ParseFailure {
    pub error: LqlError,
    pub keep_alive: bool,
    pub response_header: ResponseHeader,
}

fn parse_count(key: &str, value: &str) -> Result<usize, LqlError> {
    value
        .trim()
        .parse()
        .map_err(|_| LqlError::Parse(format!("bad {key}: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_minimal_query() {
        let q = Query::parse(&lines("GET hosts")).unwrap();
        assert_eq!(q.table, "hosts");
        assert!(q.columns.is_empty());
        assert_eq!(q.limit, -1);
    }

    #[test]
    fn test_full_query() {
        let q = Query::parse(&lines(
            "GET services\n\
             Columns: host_name description state\n\
             Filter: state = 2\n\
             Filter: acknowledged = 0\n\
             And: 2\n\
             Sort: host_name asc\n\
             Limit: 10\n\
             Offset: 5\n\
             OutputFormat: json\n\
             ResponseHeader: fixed16\n\
             KeepAlive: on\n\
             ColumnHeaders: on",
        ))
        .unwrap();
        assert_eq!(q.columns.len(), 3);
        assert_eq!(q.filters.len(), 1);
        assert!(matches!(q.filters[0], Filter::And(_)));
        assert_eq!(q.limit, 10);
        assert_eq!(q.offset, 5);
        assert_eq!(q.output_format, OutputFormat::Json);
        assert!(q.keep_alive);
        assert!(q.column_headers);
    }

    #[test]
    fn test_implicit_and_keeps_separate_filters() {
        let q = Query::parse(&lines("GET hosts\nFilter: state = 0\nFilter: name ~ web"))
            .unwrap();
        assert_eq!(q.filters.len(), 2);
    }

    #[test]
    fn test_parse_error_remembers_keepalive() {
        let failure =
            Query::parse(&lines("GET hosts\nKeepAlive: on\nBogusHeader: 1")).unwrap_err();
        assert!(failure.keep_alive);
        assert!(matches!(failure.error, LqlError::Parse(_)));
    }

    #[test]
    fn test_keepalive_after_error_is_not_seen() {
        let failure =
            Query::parse(&lines("GET hosts\nBogusHeader: 1\nKeepAlive: on")).unwrap_err();
        assert!(!failure.keep_alive);
    }

    #[test]
    fn test_round_trip() {
        let text = "GET services\n\
                    Columns: host_name state\n\
                    Filter: state = 2\n\
                    Filter: state = 1\n\
                    Or: 2\n\
                    Filter: notifications_enabled = 1\n\
                    Stats: state = 0\n\
                    Stats: sum latency\n\
                    Sort: host_name desc\n\
                    Limit: 50\n\
                    OutputFormat: json\n\
                    KeepAlive: on";
        let q1 = Query::parse(&lines(text)).unwrap();
        let q2 = Query::parse(&q1.serialize()).unwrap();
        assert_eq!(q1.table, q2.table);
        assert_eq!(q1.columns, q2.columns);
        assert_eq!(q1.filters, q2.filters);
        assert_eq!(q1.stats, q2.stats);
        assert_eq!(q1.sorts, q2.sorts);
        assert_eq!(q1.limit, q2.limit);
        assert_eq!(q1.output_format, q2.output_format);
        assert_eq!(q1.keep_alive, q2.keep_alive);
    }
}
