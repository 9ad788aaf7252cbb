// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Markers for the type-state builders of the policy layers.

/// Marks a required builder property as configured.
#[non_exhaustive]
#[derive(Debug)]
pub struct Set;

/// Marks a required builder property as still missing.
///
/// A layer whose type carries `NotSet` cannot be turned into a service.
#[non_exhaustive]
#[derive(Debug)]
pub struct NotSet;
