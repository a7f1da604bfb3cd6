// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    error::Error,
    fmt::{self, Write as _},
    path::PathBuf,
};

use calsys_filter::{
    CompileOptions, EntityType, EventQuery, ParamTest, PropFilter, PropTest, QueryFilter,
    SearchCapabilities,
};
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint, arg, value_parser};
use colored::Colorize;

#[derive(Debug, Clone)]
pub struct CmdFilter {
    pub path: PathBuf,
    pub forbidden: Vec<String>,
    pub case_sensitive: bool,
}

impl CmdFilter {
    pub const NAME: &str = "filter";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Compile a CalDAV filter or calendar-query and show the result")
            .arg(
                arg!(<FILE> "XML body holding a <filter> or <calendar-query>")
                    .value_parser(value_parser!(PathBuf))
                    .value_hint(ValueHint::FilePath),
            )
            .arg(
                Arg::new("forbid")
                    .long("forbid")
                    .value_name("PROPERTY")
                    .help("Property the caller may not filter on")
                    .action(ArgAction::Append),
            )
            .arg(
                Arg::new("case-sensitive")
                    .long("case-sensitive")
                    .help("Assume the index can evaluate case-sensitive text matches")
                    .action(ArgAction::SetTrue),
            )
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            path: matches
                .get_one::<PathBuf>("FILE")
                .cloned()
                .unwrap_or_default(),
            forbidden: matches
                .get_many::<String>("forbid")
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
            case_sensitive: matches.get_flag("case-sensitive"),
        }
    }

    pub async fn run(self) -> Result<(), Box<dyn Error>> {
        tracing::debug!(?self, "compiling filter...");
        let xml = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| format!("Failed to read {}: {e}", self.path.display()))?;

        let filter = QueryFilter::parse(&xml)?;
        let query = filter.query_with(&self.options())?;
        print!("{}", render(&filter, &query)?);
        Ok(())
    }

    fn options(&self) -> CompileOptions {
        let capabilities = SearchCapabilities {
            case_sensitive_text: self.case_sensitive,
        };
        self.forbidden
            .iter()
            .fold(CompileOptions::default(), |options, p| options.forbid(p))
            .with_capabilities(capabilities)
    }
}

fn render(filter: &QueryFilter, query: &EventQuery) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let predicate = query
        .predicate
        .as_ref()
        .map_or_else(|| "(everything)".to_string(), ToString::to_string);
    writeln!(out, "{} {predicate}", "Predicate:".bold())?;
    writeln!(
        out,
        "{} {}",
        "Post-filter:".bold(),
        if query.post_filter { "yes" } else { "no" }
    )?;
    if let Some(tzid) = filter.tzid() {
        writeln!(out, "{} {tzid}", "Timezone:".bold())?;
    }
    if let Some(limit) = filter.limit() {
        writeln!(out, "{} {limit}", "Limit:".bold())?;
    }

    for entity in [
        EntityType::Event,
        EntityType::Todo,
        EntityType::Journal,
        EntityType::FreeBusy,
    ] {
        let groups = [
            (entity.to_string(), query.filters_for(entity)),
            (format!("{entity} > VALARM"), query.alarm_filters_for(entity)),
        ];
        for (scope, filters) in groups {
            if filters.is_empty() {
                continue;
            }
            writeln!(out, " {} {scope}", "►".green())?;
            for f in filters {
                writeln!(out, "   {}", describe(f))?;
            }
        }
    }
    Ok(out)
}

fn describe(filter: &PropFilter) -> String {
    let test = match &filter.test {
        PropTest::Defined => " is defined".to_string(),
        PropTest::IsNotDefined => " is not defined".to_string(),
        PropTest::TimeRange(range) => format!(" in {range}"),
        PropTest::TextMatch(m) => m.to_string(),
    };
    let params: Vec<String> = filter
        .param_filters
        .iter()
        .map(|p| match &p.test {
            ParamTest::IsNotDefined => format!("{} is not defined", p.param_name),
            ParamTest::TextMatch(m) => format!("{}{m}", p.param_name),
        })
        .collect();
    if params.is_empty() {
        format!("{}{test}", filter.property_name)
    } else {
        format!("{}{test} with {}", filter.property_name, params.join(" or "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CmdFilter {
        let cmd = Command::new("test").subcommand(CmdFilter::command());
        let matches = cmd.try_get_matches_from(args).unwrap();
        let Some((CmdFilter::NAME, sub)) = matches.subcommand() else {
            panic!("Expected filter subcommand");
        };
        CmdFilter::from(sub)
    }

    #[test]
    fn test_parse_filter() {
        let cmd = parse(&[
            "test",
            "filter",
            "q.xml",
            "--forbid",
            "ATTENDEE",
            "--forbid",
            "ORGANIZER",
            "--case-sensitive",
        ]);
        assert_eq!(cmd.path, PathBuf::from("q.xml"));
        assert_eq!(cmd.forbidden, ["ATTENDEE", "ORGANIZER"]);
        assert!(cmd.case_sensitive);
        assert!(cmd.options().forbidden.contains("ORGANIZER"));
    }

    #[test]
    fn test_render_residual_filters() {
        colored::control::set_override(false);
        let filter = QueryFilter::parse(
            r#"<filter><comp-filter name="VCALENDAR"><comp-filter name="VEVENT">
                 <prop-filter name="SUMMARY">
                   <text-match>Meeting</text-match>
                   <param-filter name="X-FOO"><text-match>bar</text-match></param-filter>
                 </prop-filter>
               </comp-filter></comp-filter></filter>"#,
        )
        .unwrap();
        let query = filter.query().unwrap();
        let out = render(&filter, &query).unwrap();
        assert!(out.contains("Predicate: EntityType=VEVENT"));
        assert!(out.contains("Post-filter: yes"));
        assert!(out.contains(r#"SUMMARY~"Meeting" with X-FOO~"bar""#));
    }

    #[test]
    fn test_render_alarm_filters_under_parent() {
        colored::control::set_override(false);
        let filter = QueryFilter::parse(
            r#"<filter><comp-filter name="VCALENDAR">
                 <comp-filter name="VTODO">
                   <comp-filter name="VALARM"><prop-filter name="X-KIND"/></comp-filter>
                 </comp-filter>
               </comp-filter></filter>"#,
        )
        .unwrap();
        let query = filter.query().unwrap();
        let out = render(&filter, &query).unwrap();
        assert!(out.contains("VTODO > VALARM\n   X-KIND is defined"));
        assert!(!out.contains("VEVENT"));
    }
}
