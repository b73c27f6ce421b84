//! Inline data node expressions.
//!
//! `ds_${0..1}.t_order_${0..1}` expands to the cartesian product
//! `ds_0.t_order_0, ds_0.t_order_1, ds_1.t_order_0, ds_1.t_order_1`.
//! Groups are either inclusive integer ranges (`${0..3}`) or
//! lists (`${['a', 'b']}`). Top-level commas separate expressions.

use crate::Error;

/// Expand an inline expression into every value it describes.
pub fn expand(expression: &str) -> Result<Vec<String>, Error> {
    let mut result = vec![];

    for part in split_top_level(expression) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        result.extend(expand_one(part)?);
    }

    Ok(result)
}

/// Expand an inline expression into `(data_source, table)` pairs.
pub fn data_nodes(expression: &str) -> Result<Vec<(String, String)>, Error> {
    expand(expression)?
        .into_iter()
        .map(|node| match node.split_once('.') {
            Some((ds, table)) if !ds.is_empty() && !table.is_empty() => {
                Ok((ds.to_owned(), table.to_owned()))
            }
            _ => Err(Error::DataNode(node)),
        })
        .collect()
}

fn split_top_level(expression: &str) -> Vec<&str> {
    let mut parts = vec![];
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in expression.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&expression[start..i]);
                start = i + 1;
            }
            _ => (),
        }
    }

    parts.push(&expression[start..]);
    parts
}

fn expand_one(expression: &str) -> Result<Vec<String>, Error> {
    let mut results = vec![String::new()];
    let mut rest = expression;

    while let Some(open) = rest.find("${") {
        let literal = &rest[..open];
        let group = &rest[open + 2..];
        let close = group
            .find('}')
            .ok_or_else(|| Error::InlineExpression(expression.to_owned()))?;
        let choices =
            choices(&group[..close]).ok_or_else(|| Error::InlineExpression(expression.to_owned()))?;

        let next: Vec<String> = results
            .iter()
            .flat_map(|prefix| {
                choices
                    .iter()
                    .map(move |choice| format!("{}{}{}", prefix, literal, choice))
            })
            .collect();
        results = next;
        rest = &group[close + 1..];
    }

    for result in results.iter_mut() {
        result.push_str(rest);
    }

    Ok(results)
}

fn choices(group: &str) -> Option<Vec<String>> {
    let group = group.trim();

    if let Some(list) = group.strip_prefix('[').and_then(|g| g.strip_suffix(']')) {
        let values = list
            .split(',')
            .map(|value| value.trim().trim_matches(|c| c == '\'' || c == '"'))
            .filter(|value| !value.is_empty())
            .map(|value| value.to_owned())
            .collect::<Vec<_>>();
        return if values.is_empty() { None } else { Some(values) };
    }

    if let Some((start, end)) = group.split_once("..") {
        let start: i64 = start.trim().parse().ok()?;
        let end: i64 = end.trim().parse().ok()?;
        if start > end {
            return None;
        }
        return Some((start..=end).map(|i| i.to_string()).collect());
    }

    if group.is_empty() {
        None
    } else {
        Some(vec![group.to_owned()])
    }
}
