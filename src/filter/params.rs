use thiserror::Error;
use url::form_urlencoded;

use crate::layout::LayoutMode;

use super::{FilterState, Focus, YearRange};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("invalid value {value:?} for `{key}`")]
    InvalidValue { key: String, value: String },
}

impl ParamsError {
    fn invalid(key: &str, value: &str) -> Self {
        Self::InvalidValue {
            key: key.to_owned(),
            value: value.to_owned(),
        }
    }
}

/// Everything a shareable link restores: filters plus the layout mode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViewState {
    pub filter: FilterState,
    pub layout: LayoutMode,
}

impl ViewState {
    /// Flat key/value pairs, skipping every key that equals its value in `defaults`.
    pub fn to_params(&self, defaults: &ViewState) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        let filter = &self.filter;
        let base = &defaults.filter;

        if let Some(node) = filter.focus.node
            && filter.focus.node != base.focus.node
        {
            params.push(("focus", node.to_string()));
        }
        if filter.focus.depth != base.focus.depth {
            params.push(("depth", filter.focus.depth.to_string()));
        }

        let range = filter.year_range;
        let base_range = base.year_range;
        if let Some(range) = range {
            if base_range.is_none_or(|base| base.min != range.min) {
                params.push(("yearMin", range.min.to_string()));
            }
            if base_range.is_none_or(|base| base.max != range.max) {
                params.push(("yearMax", range.max.to_string()));
            }
        }

        let search = filter.search.trim();
        if !search.is_empty() && search != base.search.trim() {
            params.push(("search", search.to_owned()));
        }
        if filter.only_flagged != base.only_flagged {
            params.push(("onlyFlagged", filter.only_flagged.to_string()));
        }
        if filter.show_flagged_highlight != base.show_flagged_highlight {
            params.push((
                "showFlaggedHighlight",
                filter.show_flagged_highlight.to_string(),
            ));
        }
        if self.layout != defaults.layout {
            params.push(("layout", self.layout.as_str().to_owned()));
        }

        params
    }

    pub fn to_query(&self, defaults: &ViewState) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_params(defaults))
            .finish()
    }

    /// Parses a query string (a leading `#` or `?` is ignored) on top of `defaults`.
    ///
    /// Unknown keys are skipped. A focus id is kept as given; whether it names a real node is
    /// decided when visibility is computed.
    pub fn from_query(query: &str, defaults: &ViewState) -> Result<Self, ParamsError> {
        let query = query.trim().trim_start_matches(['#', '?']);
        let mut state = defaults.clone();
        let mut year_min = None;
        let mut year_max = None;

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim();
            match key.as_ref() {
                "focus" => {
                    state.filter.focus.node = if value.is_empty() {
                        None
                    } else {
                        Some(value.parse().map_err(|_| ParamsError::invalid("focus", value))?)
                    };
                }
                "depth" => {
                    state.filter.focus.depth = value
                        .parse()
                        .map_err(|_| ParamsError::invalid("depth", value))?;
                }
                "yearMin" => {
                    year_min = Some(
                        value
                            .parse::<i32>()
                            .map_err(|_| ParamsError::invalid("yearMin", value))?,
                    );
                }
                "yearMax" => {
                    year_max = Some(
                        value
                            .parse::<i32>()
                            .map_err(|_| ParamsError::invalid("yearMax", value))?,
                    );
                }
                "search" => state.filter.search = value.to_owned(),
                "onlyFlagged" => state.filter.only_flagged = parse_flag("onlyFlagged", value)?,
                "showFlaggedHighlight" => {
                    state.filter.show_flagged_highlight =
                        parse_flag("showFlaggedHighlight", value)?;
                }
                "layout" => {
                    state.layout =
                        LayoutMode::parse(value).ok_or_else(|| ParamsError::invalid("layout", value))?;
                }
                _ => {}
            }
        }

        if year_min.is_some() || year_max.is_some() {
            let base = state.filter.year_range;
            let min = year_min.or(base.map(|range| range.min));
            let max = year_max.or(base.map(|range| range.max));
            state.filter.year_range = match (min, max) {
                (Some(min), Some(max)) => Some(YearRange::new(min, max)),
                (Some(only), None) | (None, Some(only)) => Some(YearRange::new(only, only)),
                (None, None) => None,
            };
        }

        if state.filter.focus.node.is_none() {
            state.filter.focus.depth = Focus::DEFAULT_DEPTH;
        }

        Ok(state)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ParamsError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ParamsError::invalid(key, value)),
    }
}
