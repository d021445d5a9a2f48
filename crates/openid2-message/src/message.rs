#![forbid(unsafe_code)]

//! Namespace-qualified message model.

use openid2_core::{ns, Error};
use std::collections::BTreeMap;
use std::fmt;

/// A protocol version or extension namespace URI.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamespaceUri(String);

impl NamespaceUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NamespaceUri {
    fn from(uri: &str) -> Self {
        Self(uri.to_owned())
    }
}

impl From<String> for NamespaceUri {
    fn from(uri: String) -> Self {
        Self(uri)
    }
}

impl PartialEq<str> for NamespaceUri {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for NamespaceUri {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for NamespaceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A (namespace, local name) pair identifying one argument.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageKey {
    namespace: NamespaceUri,
    key: String,
}

impl MessageKey {
    pub fn new(namespace: impl Into<NamespaceUri>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    pub fn namespace(&self) -> &NamespaceUri {
        &self.namespace
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// An argument value. Values are opaque; nothing is coerced.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageValue(String);

impl MessageValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for MessageValue {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for MessageValue {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for MessageValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for MessageValue {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for MessageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An OpenID message: a protocol namespace, the extension namespace aliases
/// declared on the wire, and the arguments.
///
/// The alias maps are kept bijective and the protocol namespace never has an
/// alias. `Clone` produces an independent deep copy; take one before mutating
/// a message another owner still reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    namespace: NamespaceUri,
    alias_to_uri: BTreeMap<String, NamespaceUri>,
    uri_to_alias: BTreeMap<NamespaceUri, String>,
    args: BTreeMap<MessageKey, MessageValue>,
}

impl Message {
    /// Create an empty message in the given protocol namespace.
    pub fn new(namespace: impl Into<NamespaceUri>) -> Self {
        Self {
            namespace: namespace.into(),
            alias_to_uri: BTreeMap::new(),
            uri_to_alias: BTreeMap::new(),
            args: BTreeMap::new(),
        }
    }

    /// The protocol namespace in force.
    pub fn namespace(&self) -> &NamespaceUri {
        &self.namespace
    }

    /// Whether the message uses one of the OpenID 1.x namespaces.
    pub fn is_openid1(&self) -> bool {
        ns::is_openid1(self.namespace.as_str())
    }

    /// Resolve an alias. `openid` resolves to the protocol namespace.
    pub fn namespace_uri(&self, alias: &str) -> Option<&NamespaceUri> {
        if alias == "openid" {
            Some(&self.namespace)
        } else {
            self.alias_to_uri.get(alias)
        }
    }

    /// Alias of a namespace. The protocol namespace has the empty alias.
    pub fn namespace_alias(&self, uri: &NamespaceUri) -> Option<&str> {
        if *uri == self.namespace {
            Some("")
        } else {
            self.uri_to_alias.get(uri).map(String::as_str)
        }
    }

    /// Declare `alias` for `uri`, replacing any previous mapping of either.
    pub fn set_namespace_alias(
        &mut self,
        alias: impl Into<String>,
        uri: impl Into<NamespaceUri>,
    ) -> Result<(), Error> {
        let alias = alias.into();
        let uri = uri.into();

        if uri == self.namespace {
            return Err(Error::MalformedMessage(format!(
                "protocol namespace cannot be aliased as {alias}"
            )));
        }
        validate_alias(&alias)?;

        if let Some(old_uri) = self.alias_to_uri.remove(&alias) {
            self.uri_to_alias.remove(&old_uri);
        }
        if let Some(old_alias) = self.uri_to_alias.remove(&uri) {
            self.alias_to_uri.remove(&old_alias);
        }
        self.alias_to_uri.insert(alias.clone(), uri.clone());
        self.uri_to_alias.insert(uri, alias);
        Ok(())
    }

    /// Declared aliases in alias order.
    pub fn namespace_aliases(&self) -> impl Iterator<Item = (&str, &NamespaceUri)> {
        self.alias_to_uri.iter().map(|(a, u)| (a.as_str(), u))
    }

    pub fn arg(&self, key: &MessageKey) -> Option<&MessageValue> {
        self.args.get(key)
    }

    /// Look up an argument in the protocol namespace.
    pub fn openid_arg(&self, name: &str) -> Option<&MessageValue> {
        self.args.get(&MessageKey::new(self.namespace.clone(), name))
    }

    /// Insert or replace an argument.
    pub fn add_arg(&mut self, key: MessageKey, value: impl Into<MessageValue>) {
        self.args.insert(key, value.into());
    }

    /// Insert or replace an argument in the protocol namespace.
    pub fn set_openid_arg(&mut self, name: &str, value: impl Into<MessageValue>) {
        let key = MessageKey::new(self.namespace.clone(), name);
        self.args.insert(key, value.into());
    }

    /// All arguments of one namespace, keyed by local name.
    pub fn args_in<'a>(
        &'a self,
        namespace: &'a NamespaceUri,
    ) -> impl Iterator<Item = (&'a str, &'a MessageValue)> + 'a {
        self.args
            .iter()
            .filter(move |(k, _)| k.namespace() == namespace)
            .map(|(k, v)| (k.key(), v))
    }

    /// All arguments.
    pub fn args(&self) -> impl Iterator<Item = (&MessageKey, &MessageValue)> {
        self.args.iter()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Wire name of an argument (`openid.<key>` or `openid.<alias>.<key>`),
    /// `None` when its namespace has no alias.
    pub fn qualified_key(&self, key: &MessageKey) -> Option<String> {
        match self.namespace_alias(key.namespace())? {
            "" => Some(format!("{}{}", ns::PREFIX, key.key())),
            alias => Some(format!("{}{}.{}", ns::PREFIX, alias, key.key())),
        }
    }

    /// Every fully qualified key of the message: `openid.ns`, the alias
    /// declarations, then the arguments.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(1 + self.alias_to_uri.len() + self.args.len());
        keys.push(format!("{}{}", ns::PREFIX, ns::field::NS));
        for alias in self.alias_to_uri.keys() {
            keys.push(format!("{}{}.{alias}", ns::PREFIX, ns::field::NS));
        }
        keys.extend(self.args.keys().filter_map(|k| self.qualified_key(k)));
        keys
    }
}

/// Check a namespace alias against the wire rules.
pub(crate) fn validate_alias(alias: &str) -> Result<(), Error> {
    if alias.is_empty() {
        return Err(Error::MalformedMessage("empty namespace alias".into()));
    }
    if alias.contains('.') {
        return Err(Error::MalformedMessage(format!(
            "namespace alias contains a period: {alias}"
        )));
    }
    if ns::is_protocol_field(alias) {
        return Err(Error::MalformedMessage(format!(
            "namespace alias shadows a protocol field: {alias}"
        )));
    }
    Ok(())
}
