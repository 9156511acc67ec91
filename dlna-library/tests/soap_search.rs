//! Scans over real SOAP against a mock ContentDirectory.

mod common;

use std::sync::Arc;

use common::didl;
use dlna_library::{ContentDirectoryClient, ScanError, ServiceEndpoint, SoapSearchTransport};
use mockito::Matcher;
use soap_client::SoapClient;

const CDS: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";

fn escape(xml: &str) -> String {
    xml.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn search_response(result: &str, returned: u32, total: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Body>
    <u:SearchResponse xmlns:u="{CDS}">
      <Result>{}</Result>
      <NumberReturned>{returned}</NumberReturned>
      <TotalMatches>{total}</TotalMatches>
      <UpdateID>12</UpdateID>
    </u:SearchResponse>
  </s:Body>
</s:Envelope>"#,
        escape(result)
    )
}

fn client_for(server: &mockito::Server, page_size: u32) -> ContentDirectoryClient {
    let endpoint = ServiceEndpoint {
        service_type: CDS.to_string(),
        control_url: format!("{}/ctl/ContentDir", server.url()),
        event_sub_url: None,
    };
    let transport = SoapSearchTransport::new(SoapClient::new(), endpoint);
    ContentDirectoryClient::with_page_size(Arc::new(transport), page_size)
}

fn page_mock(
    server: &mut mockito::Server,
    start: u32,
    count: u32,
    body: String,
) -> mockito::Mock {
    server
        .mock("POST", "/ctl/ContentDir")
        .match_header(
            "SOAPACTION",
            "\"urn:schemas-upnp-org:service:ContentDirectory:1#Search\"",
        )
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("<ContainerID>0</ContainerID>".to_string()),
            Matcher::Regex(
                "<SearchCriteria>upnp:class derivedfrom &quot;object.item.audioItem&quot;</SearchCriteria>"
                    .to_string(),
            ),
            Matcher::Regex("<Filter>\\*</Filter>".to_string()),
            Matcher::Regex(format!("<StartingIndex>{start}</StartingIndex>")),
            Matcher::Regex(format!("<RequestedCount>{count}</RequestedCount>")),
        ]))
        .with_status(200)
        .with_header("Content-Type", "text/xml; charset=\"utf-8\"")
        .with_body(body)
        .create()
}

#[test]
fn test_scan_pages_through_search() {
    let mut server = mockito::Server::new();
    let first = page_mock(&mut server, 0, 2, search_response(&didl(0..2), 2, 3));
    let second = page_mock(&mut server, 2, 1, search_response(&didl(2..3), 1, 3));

    let tracks = client_for(&server, 2).browse_audio_items().unwrap();

    first.assert();
    second.assert();
    assert_eq!(tracks.len(), 3);
    assert_eq!(tracks[0].title.as_deref(), Some("Track 0"));
    assert_eq!(tracks[0].artist.as_deref(), Some("Artist"));
    assert_eq!(
        tracks[2].uri,
        "http://192.168.1.20:8200/MediaItems/2.mp3"
    );
}

#[test]
fn test_missing_total_is_protocol_error() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/ctl/ContentDir")
        .with_status(200)
        .with_body(format!(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:SearchResponse xmlns:u="{CDS}"><Result></Result><NumberReturned>0</NumberReturned></u:SearchResponse></s:Body></s:Envelope>"#
        ))
        .create();

    let result = client_for(&server, 64).browse_audio_items();
    assert!(matches!(result, Err(ScanError::Protocol(_))));
}

#[test]
fn test_upnp_fault_is_protocol_error() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/ctl/ContentDir")
        .with_status(500)
        .with_body(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><s:Fault><faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring><detail><UPnPError xmlns="urn:schemas-upnp-org:control-1-0"><errorCode>708</errorCode><errorDescription>Unsupported or invalid search criteria</errorDescription></UPnPError></detail></s:Fault></s:Body></s:Envelope>"#,
        )
        .create();

    let result = client_for(&server, 64).browse_audio_items();
    assert!(matches!(result, Err(ScanError::Protocol(_))));
}

#[test]
fn test_unreachable_server_is_transport_error() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("POST", "/ctl/ContentDir")
        .with_status(503)
        .create();

    let result = client_for(&server, 64).browse_audio_items();
    assert!(matches!(result, Err(ScanError::Transport(_))));
}

#[test]
fn test_failure_on_second_page_discards_first() {
    let mut server = mockito::Server::new();
    let _first = page_mock(&mut server, 0, 2, search_response(&didl(0..2), 2, 4));
    let _second = server
        .mock("POST", "/ctl/ContentDir")
        .match_body(Matcher::Regex("<StartingIndex>2</StartingIndex>".to_string()))
        .with_status(200)
        .with_body("not xml at all")
        .create();

    let result = client_for(&server, 2).browse_audio_items();
    assert!(matches!(result, Err(ScanError::Protocol(_))));
}
