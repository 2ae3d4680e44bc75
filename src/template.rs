// template.rs

use crate::*;

pub const INDEX_HTML: &str = include_str!("index.html");

const PLACEHOLDER_DELIM: char = '%';

/// Placeholder values for the index page, taken from one state snapshot.
pub struct TemplateProcessor<'a> {
    pub config: &'a MyConfig,
    pub snap: &'a Snapshot,
}

impl TemplateProcessor<'_> {
    /// Unknown names give an empty string.
    pub fn value(&self, name: &str) -> String {
        let snap = self.snap;
        match name {
            "UPTIME" => snap.uptime.to_string(),
            "WHERE" => self.config.where_.clone(),
            "SSID" => snap.net.ssid.clone(),
            "MAC" => snap.net.mac_string(),
            "IP" => snap.net.ip.to_string(),
            "TEMPERATURE" => format!("{:.1}", snap.temperature),
            "LIGHT" => snap.light.to_string(),
            "COOLER" => (if snap.cooler_on { "on" } else { "off" }).to_string(),
            "HEATER" => "N/A".to_string(),
            "LT" => format!("{:.1}", snap.low_threshold),
            "HT" => format!("{:.1}", snap.high_threshold),
            "PRT_IP" if !snap.target.is_set() => "not set".to_string(),
            "PRT_IP" => snap.target.ip.clone(),
            "PRT_PORT" => snap.target.port.to_string(),
            "PRT_T" => snap.target.period.to_string(),
            _ => String::new(),
        }
    }

    /// Values are html-escaped, the form-supplied target ip included.
    pub fn render(&self, template: &str) -> String {
        render(template, |name| html_escape(&self.value(name)))
    }
}

pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn is_placeholder_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Replace every `%NAME%` in `template` with `lookup(NAME)`.
/// `%%` is a literal percent sign, any other `%` is copied as is.
pub fn render<F>(template: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> String,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(PLACEHOLDER_DELIM) {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        match after.find(PLACEHOLDER_DELIM) {
            Some(0) => {
                out.push(PLACEHOLDER_DELIM);
                rest = &after[1..];
            }
            Some(end) if is_placeholder_name(&after[..end]) => {
                out.push_str(&lookup(&after[..end]));
                rest = &after[end + 1..];
            }
            _ => {
                // e.g. "width: 50%;" in inline css
                out.push(PLACEHOLDER_DELIM);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> Snapshot {
        Snapshot {
            uptime: 42,
            net: NetInfo {
                ssid: "lab".into(),
                mac: [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01],
                ip: net::Ipv4Addr::new(192, 168, 4, 2),
            },
            temperature: 23.46,
            light: 812,
            cooler_on: true,
            fire_detected: false,
            fan_speed: 0,
            low_threshold: 18.0,
            high_threshold: 30.0,
            light_threshold: 1000,
            target: ReportTarget {
                ip: String::new(),
                port: 8080,
                period: 60,
            },
        }
    }

    #[test]
    fn known_placeholders() {
        let config = MyConfig::default();
        let snap = snapshot();
        let p = TemplateProcessor { config: &config, snap: &snap };

        assert_eq!(p.value("UPTIME"), "42");
        assert_eq!(p.value("WHERE"), "ESP32 Lab HTTP");
        assert_eq!(p.value("MAC"), "DE:AD:BE:EF:00:01");
        assert_eq!(p.value("IP"), "192.168.4.2");
        assert_eq!(p.value("TEMPERATURE"), "23.5");
        assert_eq!(p.value("COOLER"), "on");
        assert_eq!(p.value("HEATER"), "N/A");
        assert_eq!(p.value("LT"), "18.0");
        assert_eq!(p.value("PRT_IP"), "not set");
        assert_eq!(p.value("PRT_T"), "60");
    }

    #[test]
    fn unknown_placeholder_is_empty() {
        let config = MyConfig::default();
        let snap = snapshot();
        let p = TemplateProcessor { config: &config, snap: &snap };

        assert_eq!(p.value("BOGUS"), "");
        assert_eq!(p.render("<b>%BOGUS%</b>"), "<b></b>");
    }

    #[test]
    fn substituted_values_are_escaped() {
        let config = MyConfig {
            where_: "Tom & Jerry's".into(),
            ..Default::default()
        };
        let mut snap = snapshot();
        snap.target.ip = "<script>alert(1)</script>".into();
        let p = TemplateProcessor { config: &config, snap: &snap };

        // raw lookup stays unescaped
        assert_eq!(p.value("PRT_IP"), "<script>alert(1)</script>");
        assert_eq!(
            p.render("<p>%PRT_IP%</p><input value=\"%WHERE%\">"),
            "<p>&lt;script&gt;alert(1)&lt;/script&gt;</p><input value=\"Tom &amp; Jerry&#39;s\">"
        );
    }

    #[test]
    fn render_keeps_stray_percent() {
        let out = render("%HT% 100%% width: 50%; %LT%", |n| format!("[{n}]"));
        assert_eq!(out, "[HT] 100% width: 50%; [LT]");
        assert_eq!(render("tail %", |_| "x".into()), "tail %");
    }
}

// EOF
