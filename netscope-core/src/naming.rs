use crate::metadata::TypeInfo;

/// Maps a type and one of its members to the externally visible path.
pub trait NamingStrategy: Send + Sync + std::fmt::Debug {
    fn build_path(&self, owner: &TypeInfo, member: &str) -> String;
}

/// `/<namespace>/<TypeSimpleName>/<member>`
#[derive(Debug, Clone)]
pub struct DefaultNamingStrategy {
    namespace: String,
}

impl DefaultNamingStrategy {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

impl Default for DefaultNamingStrategy {
    fn default() -> Self {
        Self::new("netscope")
    }
}

impl NamingStrategy for DefaultNamingStrategy {
    fn build_path(&self, owner: &TypeInfo, member: &str) -> String {
        format!("/{}/{}/{}", self.namespace, owner.simple_name(), member)
    }
}

/// `/<prefix>[/<version>]/<type-kebab>/<member-kebab>`
#[derive(Debug, Clone)]
pub struct KebabCaseNamingStrategy {
    prefix: String,
    version: Option<String>,
}

impl KebabCaseNamingStrategy {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl NamingStrategy for KebabCaseNamingStrategy {
    fn build_path(&self, owner: &TypeInfo, member: &str) -> String {
        let mut path = format!("/{}", self.prefix);
        if let Some(version) = &self.version {
            path.push('/');
            path.push_str(version);
        }
        path.push('/');
        path.push_str(&to_kebab_case(owner.simple_name()));
        path.push('/');
        path.push_str(&to_kebab_case(member));
        path
    }
}

/// `sayHello`, `SayHello` and `say_hello` all become `say-hello`.
pub fn to_kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch == '_' || ch == '-' || ch == ' ' {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            prev_lower = false;
        } else if ch.is_uppercase() {
            if prev_lower && !out.ends_with('-') {
                out.push('-');
            }
            out.extend(ch.to_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        }
    }
    out
}
