use crate::domain::model::{capabilities_url, CapabilitiesEntry, Caller};
use crate::utils::error::{ExtractorError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use reqwest::Client;
use url::Url;

pub const SEC_USERNAME_HEADER: &str = "sec-username";
pub const SEC_ROLES_HEADER: &str = "sec-roles";

/// WFS 1.0/1.1 and 2.0 capabilities namespaces.
const WFS_NAMESPACES: [&[u8]; 2] = [
    b"http://www.opengis.net/wfs",
    b"http://www.opengis.net/wfs/2.0",
];

/// Reads the feature types a WFS advertises to a given caller.
#[derive(Debug, Clone, Default)]
pub struct CapabilitiesResolver {
    client: Client,
}

impl CapabilitiesResolver {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Fetches `GetCapabilities` from `service_url`. When `trusted` is set the
    /// caller's identity travels in the security proxy headers so the proxy
    /// filters the document as that caller would see it.
    pub async fn fetch_capabilities(
        &self,
        service_url: &Url,
        trusted: bool,
        caller: &Caller,
    ) -> Result<Vec<CapabilitiesEntry>> {
        let url = capabilities_url(service_url, "WFS", None);
        tracing::debug!("Fetching capabilities from: {}", url);

        let mut request = self.client.get(url.clone());
        if trusted {
            for (name, value) in impersonation_headers(caller) {
                request = request.header(name, value);
            }
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("Capabilities response status: {}", status);

        if !status.is_success() {
            return Err(ExtractorError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let entries = parse_capabilities(&body)?;
        tracing::info!("{} feature types advertised by {}", entries.len(), service_url);
        Ok(entries)
    }
}

/// Headers set for trusted hosts. Absent identity parts are left out.
pub fn impersonation_headers(caller: &Caller) -> Vec<(&'static str, String)> {
    let mut headers = Vec::new();
    if let Some(username) = &caller.username {
        headers.push((SEC_USERNAME_HEADER, username.clone()));
    }
    if !caller.roles.is_empty() {
        headers.push((SEC_ROLES_HEADER, caller.roles.join(";")));
    }
    headers
}

struct PendingEntry {
    depth: usize,
    name: Option<String>,
    namespaces: Vec<String>,
}

fn is_wfs(ns: &ResolveResult) -> bool {
    match ns {
        ResolveResult::Bound(Namespace(uri)) => WFS_NAMESPACES.iter().any(|wfs| wfs == uri),
        _ => false,
    }
}

/// `Name` children count when they are in a WFS namespace or in none.
fn is_name_element(ns: &ResolveResult, element: &BytesStart) -> bool {
    element.local_name().as_ref() == b"Name" && (matches!(ns, ResolveResult::Unbound) || is_wfs(ns))
}

fn attribute_values(element: &BytesStart) -> Result<Vec<String>> {
    let mut values = Vec::new();
    for attribute in element.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        values.push(attribute.unescape_value()?.into_owned());
    }
    Ok(values)
}

/// Extracts every `wfs:FeatureType` of a capabilities document.
///
/// The name is the trimmed text of the first `Name` child; the namespaces
/// are the values of all attributes on the `FeatureType` element, namespace
/// declarations included.
pub fn parse_capabilities(xml: &str) -> Result<Vec<CapabilitiesEntry>> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<PendingEntry> = None;
    let mut name_text: Option<String> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_resolved_event()? {
            (ns, Event::Start(e)) => {
                depth += 1;
                let is_wfs_element = is_wfs(&ns);
                match current.as_mut() {
                    None if is_wfs_element && e.local_name().as_ref() == b"FeatureType" => {
                        current = Some(PendingEntry {
                            depth,
                            name: None,
                            namespaces: attribute_values(&e)?,
                        });
                    }
                    Some(entry)
                        if depth == entry.depth + 1
                            && entry.name.is_none()
                            && name_text.is_none()
                            && is_name_element(&ns, &e) =>
                    {
                        name_text = Some(String::new());
                    }
                    _ => {}
                }
            }
            (ns, Event::Empty(e)) => {
                let is_wfs_element = is_wfs(&ns);
                match current.as_mut() {
                    None if is_wfs_element && e.local_name().as_ref() == b"FeatureType" => {
                        tracing::warn!("Skipping empty FeatureType element");
                    }
                    Some(entry)
                        if depth == entry.depth
                            && entry.name.is_none()
                            && is_name_element(&ns, &e) =>
                    {
                        entry.name = Some(String::new());
                    }
                    _ => {}
                }
            }
            (_, Event::Text(t)) => {
                if let Some(text) = name_text.as_mut() {
                    text.push_str(&t.unescape()?);
                }
            }
            (_, Event::CData(c)) => {
                if let Some(text) = name_text.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            (_, Event::End(_)) => {
                if let Some(entry) = current.as_mut() {
                    if depth == entry.depth + 1 {
                        if let Some(text) = name_text.take() {
                            entry.name = Some(text.trim().to_string());
                        }
                    } else if depth == entry.depth {
                        if let Some(done) = current.take() {
                            match done.name {
                                Some(name) => {
                                    entries.push(CapabilitiesEntry::new(name, done.namespaces))
                                }
                                None => tracing::warn!("Skipping FeatureType without a Name"),
                            }
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            (_, Event::Eof) => break,
            _ => {}
        }
    }

    Ok(entries)
}
