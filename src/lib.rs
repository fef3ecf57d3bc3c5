// uDashBoard: featherweight dashboard application.
//
// Copyright (C) 2019  Brandon Lewis
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

extern crate regex;
extern crate serde;
#[macro_use]
extern crate lazy_static;

pub mod action;
pub mod checksum;
pub mod clock;
pub mod compiler;
pub mod config;
pub mod error;
pub mod expr;
pub mod module;
pub mod parser;
pub mod proxy;
pub mod registry;
pub mod routine;
pub mod rule;
pub mod scheduler;
pub mod storage;
pub mod value;
