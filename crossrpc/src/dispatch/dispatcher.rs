//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Request dispatch.

use super::{Arguments, ControllerRegistry, RequestContext};
use crate::codec::{RequestEnvelope, ResponseEnvelope, ResultCode};
use crate::error::{INTERNAL_ERROR_MESSAGE, RemoteError};
use crate::RpcError;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

#[cfg(feature = "observability")]
use tracing::{error, warn};

/// Routes inbound requests to controllers.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    controllers: Arc<ControllerRegistry>,
    default_controller: String,
}

impl Dispatcher {
    /// Creates a dispatcher. Actions without a `/` go to `default_controller`.
    pub fn new(controllers: Arc<ControllerRegistry>, default_controller: impl Into<String>) -> Self {
        Self {
            controllers,
            default_controller: default_controller.into(),
        }
    }

    /// The registry requests are resolved against.
    pub fn controllers(&self) -> &Arc<ControllerRegistry> {
        &self.controllers
    }

    /// Serves one request.
    ///
    /// Never fails: every outcome, including a panicking controller, becomes a
    /// response. Only [`RpcError::Remote`] reaches the caller with its own code
    /// and message; anything else is reported as `InternalError`.
    pub async fn dispatch(&self, context: RequestContext, request: RequestEnvelope) -> ResponseEnvelope {
        let (controller, method) = split_action(&request.action, &self.default_controller);

        let Some(resolved) = self.controllers.resolve(controller, method) else {
            #[cfg(feature = "observability")]
            warn!(action = %request.action, "action not found");
            return RemoteError::action_not_found(format!("action '{}' not found", request.action))
                .into();
        };

        if !resolved.allow_anonymous() && !context.is_authorized() {
            #[cfg(feature = "observability")]
            warn!(action = %request.action, "unauthorized call");
            return RemoteError::unauthorized(format!(
                "action '{}' requires an authorized connection",
                request.action
            ))
            .into();
        }

        let arguments = Arguments::new(context.format(), request.arguments);
        let call = resolved.method().invoke(context, arguments);

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(result)) => ResponseEnvelope::success(result),
            Ok(Err(RpcError::Remote(remote))) => remote.into(),
            Ok(Err(_error)) => {
                #[cfg(feature = "observability")]
                error!(action = %request.action, error = %_error, "controller failed");
                ResponseEnvelope::failure(ResultCode::InternalError, INTERNAL_ERROR_MESSAGE)
            }
            Err(_panic) => {
                #[cfg(feature = "observability")]
                error!(action = %request.action, "controller panicked");
                ResponseEnvelope::failure(ResultCode::InternalError, INTERNAL_ERROR_MESSAGE)
            }
        }
    }
}

/// Splits `"{Controller}/{Method}"` on the first `/`.
fn split_action<'a>(action: &'a str, default_controller: &'a str) -> (&'a str, &'a str) {
    action
        .split_once('/')
        .unwrap_or((default_controller, action))
}
