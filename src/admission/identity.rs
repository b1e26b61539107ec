// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Client identity derivation from proxy headers.
//!
//! Proxy headers are trusted as deployed; nothing here corroborates them.

use std::net::SocketAddr;

use axum::http::HeaderMap;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Identity used when no address can be determined.
pub const UNKNOWN_IDENTITY: &str = "unknown";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// First `X-Forwarded-For` entry, else `X-Real-IP`, else the peer IP.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(first) = header_value(headers, FORWARDED_FOR_HEADER)
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = header_value(headers, REAL_IP_HEADER) {
        return real_ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
}
