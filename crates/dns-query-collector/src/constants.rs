// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Records per collector request.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Entries shown in each ranked section of the statistics report.
pub const DEFAULT_TOP_N: usize = 5;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Path appended to `<endpoint>/<collector-id>` for DNS query submission.
pub const DNS_QUERIES_PATH: &str = "dns/queries";
