//! Search filters and value escaping

use dirauth_core::config::FilterTemplates;

use ldap3::ldap_escape;

/// Characters reserved in distinguished names (RFC 4514) that are not
/// already filter specials
const DN_SPECIALS: &[char] = &[',', '=', '+', '<', '>', ';', '"', '#'];

/// Escape a value for use inside a filter assertion (RFC 4515)
pub fn escape_filter_value(value: &str) -> String {
    ldap_escape(value).into_owned()
}

/// Escape a DN for use as a filter assertion value.
///
/// Filter specials go through [`ldap_escape`], then DN-reserved characters are
/// hex-encoded and a leading or trailing space becomes `\20`. The server
/// decodes the escapes, so the value still matches the DN stored in `member`.
pub fn escape_dn_value(dn: &str) -> String {
    let filtered = ldap_escape(dn);

    let mut out = String::with_capacity(filtered.len());
    for c in filtered.chars() {
        if DN_SPECIALS.contains(&c) {
            out.push_str(&format!("\\{:02x}", c as u32));
        } else {
            out.push(c);
        }
    }

    if out.starts_with(' ') {
        out.replace_range(0..1, "\\20");
    }
    if out.len() > 1 && out.ends_with(' ') {
        let last = out.len() - 1;
        out.replace_range(last.., "\\20");
    }
    out
}

/// Builds the three searches the resolution engine issues
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    templates: FilterTemplates,
}

impl Filters {
    pub fn new(templates: FilterTemplates) -> Self {
        Self { templates }
    }

    /// Lookup of a user by principal name or account name
    pub fn user_lookup(&self, identifier: &str) -> String {
        self.templates
            .user_lookup
            .replace("{identifier}", &escape_filter_value(identifier))
    }

    /// All groups in the directory
    pub fn group_catalog(&self) -> &str {
        &self.templates.group_catalog
    }

    /// Groups that list `group_dn` as a member
    pub fn group_parent(&self, group_dn: &str) -> String {
        self.templates
            .group_parent
            .replace("{group}", &escape_dn_value(group_dn))
    }
}
