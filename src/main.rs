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

use std::env::args;
use std::io::{stdin, BufReader};
use std::path::PathBuf;

use lizardrt::config::RuntimeConfig;
use lizardrt::scheduler::{ChannelLineSource, Scheduler, StdoutSink};
use lizardrt::storage::{FileStorage, MemoryStorage, Storage};

fn main() {
    tracing_subscriber::fmt::init();

    let config = match args().nth(1) {
        Some(path) => RuntimeConfig::load(&PathBuf::from(path)).unwrap_or_else(|e| {
            eprintln!("couldn't load config, using defaults: {}", e);
            RuntimeConfig::default()
        }),
        None => RuntimeConfig::default(),
    };

    let storage: Box<dyn Storage> = match &config.startup_store_path {
        Some(path) => Box::new(FileStorage::new(path.clone())),
        None => Box::new(MemoryStorage::default()),
    };

    let input = ChannelLineSource::from_reader(BufReader::new(stdin()));
    let mut scheduler = Scheduler::new(config, storage, Box::new(input), Box::new(StdoutSink))
        .expect("failed to initialize scheduler");

    scheduler.run_forever();
}
