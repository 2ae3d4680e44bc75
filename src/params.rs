// params.rs

use std::str::FromStr;

use thiserror::Error;

use crate::*;

/// Per-request parameter failures. The Display text is the response body.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("No parameter")]
    NoParameter,
    #[error("Unknown parameter in /{route}")]
    Unknown { route: &'static str },
    #[error("Invalid value for {name}")]
    Invalid { name: String, value: String },
}

impl ParamError {
    fn invalid(name: &str, value: &str) -> Self {
        ParamError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

pub fn parse_float(name: &str, value: &str) -> Result<f32, ParamError> {
    match value.trim().parse::<f32>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParamError::invalid(name, value)),
    }
}

pub fn parse_int<T: FromStr>(name: &str, value: &str) -> Result<T, ParamError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ParamError::invalid(name, value))
}

/// Sort the query pairs into known and unknown names before anything is applied.
///
/// `known` returns `None` for a name the route does not accept. The verdict is,
/// in order: no pairs at all, any unknown name or no known one, any malformed
/// value, else every accepted item in query order.
fn classify<T, F>(route: &'static str, params: &[(String, String)], mut known: F) -> Result<Vec<T>, ParamError>
where
    F: FnMut(&str, &str) -> Option<Result<T, ParamError>>,
{
    if params.is_empty() {
        return Err(ParamError::NoParameter);
    }

    let mut accepted = Vec::with_capacity(params.len());
    let mut invalid = None;
    let mut has_known = false;
    let mut has_unknown = false;

    for (name, value) in params {
        match known(name.as_str(), value.as_str()) {
            None => has_unknown = true,
            Some(res) => {
                has_known = true;
                match res {
                    Ok(item) => accepted.push(item),
                    Err(e) => {
                        invalid.get_or_insert(e);
                    }
                }
            }
        }
    }

    if has_unknown || !has_known {
        return Err(ParamError::Unknown { route });
    }
    match invalid {
        Some(e) => Err(e),
        None => Ok(accepted),
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValueField {
    Temperature,
    Light,
    Fire,
    HighThreshold,
    LowThreshold,
}

/// `/value?temperature&light&fire&ht&lt`, parameter values are ignored.
pub fn parse_value_query(params: &[(String, String)]) -> Result<Vec<ValueField>, ParamError> {
    classify("value", params, |name, _| {
        let field = match name {
            "temperature" => ValueField::Temperature,
            "light" => ValueField::Light,
            "fire" => ValueField::Fire,
            "ht" => ValueField::HighThreshold,
            "lt" => ValueField::LowThreshold,
            _ => return None,
        };
        Some(Ok(field))
    })
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SetCommand {
    Cool(bool),
    HighThreshold(f32),
    LowThreshold(f32),
}

/// `/set?cool=on|off&ht=<float>&lt=<float>`
pub fn parse_set_query(params: &[(String, String)]) -> Result<Vec<SetCommand>, ParamError> {
    classify("set", params, |name, value| match name {
        "cool" => Some(match value {
            "on" => Ok(SetCommand::Cool(true)),
            "off" => Ok(SetCommand::Cool(false)),
            _ => Err(ParamError::invalid(name, value)),
        }),
        "ht" => Some(parse_float(name, value).map(SetCommand::HighThreshold)),
        "lt" => Some(parse_float(name, value).map(SetCommand::LowThreshold)),
        _ => None,
    })
}

/// Form body of `POST /target`. Absent or blank fields stay `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TargetForm {
    pub ip: Option<String>,
    pub port: Option<String>,
    pub sp: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TargetUpdate {
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub period: Option<u32>,
}

impl TargetForm {
    /// Fold the posted pairs; the last non-blank value of a key wins.
    /// The status page always posts every input, so blank means not supplied.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut form = TargetForm::default();
        for (name, value) in pairs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let slot = match name.as_str() {
                "ip" => &mut form.ip,
                "port" => &mut form.port,
                "sp" => &mut form.sp,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }
        form
    }

    pub fn validate(self) -> Result<TargetUpdate, ParamError> {
        Ok(TargetUpdate {
            ip: self.ip,
            port: self.port.as_deref().map(|v| parse_int("port", v)).transpose()?,
            period: self.sp.as_deref().map(|v| parse_int("sp", v)).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn empty_query_is_no_parameter() {
        assert_eq!(parse_value_query(&[]), Err(ParamError::NoParameter));
        assert_eq!(parse_set_query(&[]), Err(ParamError::NoParameter));
    }

    #[test]
    fn any_unknown_name_fails_whole_query() {
        let err = parse_value_query(&q(&[("temperature", ""), ("ht", ""), ("bogus", "")]));
        assert_eq!(err, Err(ParamError::Unknown { route: "value" }));

        // unknown wins over a malformed known value
        let err = parse_set_query(&q(&[("ht", "abc"), ("x", "1")]));
        assert_eq!(err, Err(ParamError::Unknown { route: "set" }));
        assert_eq!(err.unwrap_err().to_string(), "Unknown parameter in /set");
    }

    #[test]
    fn set_commands_keep_query_order() {
        let cmds = parse_set_query(&q(&[("lt", "17.5"), ("cool", "on"), ("ht", " 29 ")])).unwrap();
        assert_eq!(
            cmds,
            vec![
                SetCommand::LowThreshold(17.5),
                SetCommand::Cool(true),
                SetCommand::HighThreshold(29.0),
            ]
        );
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        for bad in ["", "abc", "12abc", "NaN", "inf"] {
            let err = parse_set_query(&q(&[("ht", bad)])).unwrap_err();
            assert_eq!(err.to_string(), "Invalid value for ht", "input {bad:?}");
        }
        let err = parse_set_query(&q(&[("cool", "maybe")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for cool");
    }

    #[test]
    fn target_form_partial() {
        let form = TargetForm {
            port: Some("9000".into()),
            ..Default::default()
        };
        assert_eq!(
            form.validate().unwrap(),
            TargetUpdate {
                port: Some(9000),
                ..Default::default()
            }
        );

        let form = TargetForm {
            ip: Some("10.1.1.1".into()),
            port: Some("70000".into()),
            sp: Some("15".into()),
        };
        assert_eq!(form.validate().unwrap_err().to_string(), "Invalid value for port");
    }

    #[test]
    fn target_pairs_skip_blank_and_keep_last() {
        let form = TargetForm::from_pairs(&q(&[("ip", ""), ("port", "9000"), ("sp", "  ")]));
        assert_eq!(
            form,
            TargetForm {
                port: Some("9000".into()),
                ..Default::default()
            }
        );

        let form = TargetForm::from_pairs(&q(&[("ip", "10.0.0.1"), ("ip", "10.0.0.2"), ("ip", ""), ("x", "1")]));
        assert_eq!(form.ip.as_deref(), Some("10.0.0.2"));
    }
}

// EOF
