// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `api.rs`

#[cfg(test)]
mod tests {
    use super::super::{service_url, split_api_version};

    #[test]
    fn test_service_url() {
        assert_eq!(
            service_url("display", "demo", "cluster.local"),
            "http://display.demo.svc.cluster.local"
        );
    }

    #[test]
    fn test_split_api_version() {
        assert_eq!(
            split_api_version("eventing.knative.dev/v1"),
            ("eventing.knative.dev", "v1")
        );
        assert_eq!(split_api_version("v1"), ("", "v1"));
    }
}
