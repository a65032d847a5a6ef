// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Index page listing the artifacts

use artifact_cache_module::Catalog;
use maud::{html, DOCTYPE};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::configuration::CurrentReleaseConf;

const URI_ESC_CHARSET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'<')
    .add(b'>')
    .add(b'"')
    .add(b'#')
    .add(b'?')
    .add(b'%');

pub(crate) fn render_index(catalog: &Catalog, release: &CurrentReleaseConf) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title {
                    "Downloads"
                }
            }

            body {
                h1 {
                    "Downloads"
                }

                p {
                    "Current release: "
                    a href=(release.notes_url) {
                        (release.version)
                    }
                }

                ul {
                    @for entry in catalog.entries() {
                        li {
                            a href={ "/" (utf8_percent_encode(entry.key(), URI_ESC_CHARSET).to_string()) } {
                                (entry.display_name())
                            }
                            " (" (entry.last_modified().format("%Y-%m-%d").to_string()) ")"
                        }
                    }
                }
            }
        }
    }
    .into()
}
